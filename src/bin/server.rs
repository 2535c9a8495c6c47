use std::fs;
use std::process::ExitCode;

use btcp::logging;
use log::{error, info, LevelFilter};

struct Args {
    window: u8,
    output: String,
    verbose: u8,
}

fn parse_args() -> Args {
    let mut window = 5u8;
    let mut output = "output.txt".to_string();
    let mut verbose = 0u8;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--window" => {
                let value = iter.next().expect("--window requires a value");
                window = value.parse().expect("--window must fit in a byte (5-100 per spec.md §6)");
            }
            "--output" => {
                output = iter.next().expect("--output requires a value");
            }
            "-v" | "--verbose" => verbose += 1,
            other => panic!("unrecognised argument: {other}"),
        }
    }

    Args { window, output, verbose }
}

fn main() -> ExitCode {
    let args = parse_args();
    logging::init(if args.verbose > 0 { logging::level_from_verbosity(args.verbose) } else { LevelFilter::Info });

    let mut socket = btcp::BtcpServerSocket::new(args.window);

    info!("waiting for a connection...");
    socket.accept();
    info!("connection established");

    let data = socket.recv();
    info!("transfer complete ({} bytes)", data.len());
    socket.close();

    if let Err(err) = fs::write(&args.output, &data) {
        error!("could not write {}: {err}", args.output);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
