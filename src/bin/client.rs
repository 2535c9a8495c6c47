use std::fs;
use std::process::ExitCode;

use btcp::logging;
use log::{error, info, LevelFilter};

struct Args {
    timeout_ms: u64,
    input: String,
    verbose: u8,
}

fn parse_args() -> Args {
    let mut timeout_ms = 100u64;
    let mut input = "input.txt".to_string();
    let mut verbose = 0u8;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--timeout" => {
                let value = iter.next().expect("--timeout requires a value");
                timeout_ms = value.parse().expect("--timeout must be an integer number of milliseconds");
            }
            "--input" => {
                input = iter.next().expect("--input requires a value");
            }
            "-v" | "--verbose" => verbose += 1,
            other => panic!("unrecognised argument: {other}"),
        }
    }

    Args { timeout_ms, input, verbose }
}

fn main() -> ExitCode {
    let args = parse_args();
    logging::init(if args.verbose > 0 { logging::level_from_verbosity(args.verbose) } else { LevelFilter::Info });

    let data = match fs::read(&args.input) {
        Ok(data) => data,
        Err(err) => {
            error!("could not read {}: {err}", args.input);
            return ExitCode::FAILURE;
        }
    };

    let mut socket = btcp::BtcpClientSocket::new(args.timeout_ms);

    if !socket.connect() {
        error!("connect failed");
        return ExitCode::FAILURE;
    }
    info!("connected");

    if !socket.send(&data) {
        error!("send did not complete reliably");
    } else {
        info!("transfer complete ({} bytes)", data.len());
    }

    let disconnected = socket.disconnect();
    socket.close();

    if !disconnected {
        error!("disconnect failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
