use crate::codec::{Flags, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClientState {
    Closed,
    SynSent,
    Established,
    FinWait,
    ClosedFinal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServerState {
    Listen,
    SynReceived,
    Established,
    Closing,
    Closed,
}

pub(crate) fn syn(isn: u16) -> Segment {
    Segment::new(isn, 0, Flags::SYN, 0, vec![])
}

pub(crate) fn syn_ack(server_isn: u16, client_isn: u16, window: u8) -> Segment {
    Segment::new(server_isn, client_isn.wrapping_add(1), Flags::syn_ack(), window, vec![])
}

pub(crate) fn ack(seq_num: u16, ack_num: u16, window: u8) -> Segment {
    Segment::new(seq_num, ack_num, Flags::ACK, window, vec![])
}

pub(crate) fn fin() -> Segment {
    Segment::new(0, 0, Flags::FIN, 0, vec![])
}

pub(crate) fn fin_ack() -> Segment {
    Segment::new(0, 0, Flags::fin_ack(), 0, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syn_carries_isn_and_only_the_syn_flag() {
        let segment = syn(1234);
        assert_eq!(segment.seq_num, 1234);
        assert_eq!(segment.ack_num, 0);
        assert_eq!(segment.flags, Flags::SYN);
    }

    #[test]
    fn syn_ack_acks_client_isn_plus_one() {
        let segment = syn_ack(500, 1234, 7);
        assert_eq!(segment.seq_num, 500);
        assert_eq!(segment.ack_num, 1235);
        assert_eq!(segment.window_size, 7);
        assert_eq!(segment.flags, Flags::syn_ack());
    }

    #[test]
    fn fin_and_fin_ack_carry_zeroed_fields() {
        let fin_segment = fin();
        assert_eq!(fin_segment.flags, Flags::FIN);
        assert_eq!(fin_segment.seq_num, 0);

        let fin_ack_segment = fin_ack();
        assert_eq!(fin_ack_segment.flags, Flags::fin_ack());
    }
}
