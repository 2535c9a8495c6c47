// ACK at bit 0, SYN at bit 1, FIN at bit 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Flags {
    pub ack: bool,
    pub syn: bool,
    pub fin: bool,
}

impl Flags {
    pub const ACK: Flags = Flags { ack: true, syn: false, fin: false };
    pub const SYN: Flags = Flags { ack: false, syn: true, fin: false };
    pub const FIN: Flags = Flags { ack: false, syn: false, fin: true };

    pub const fn syn_ack() -> Flags {
        Flags { ack: true, syn: true, fin: false }
    }

    pub const fn fin_ack() -> Flags {
        Flags { ack: true, syn: false, fin: true }
    }

    pub fn to_byte(self) -> u8 {
        (self.ack as u8) | (self.syn as u8) << 1 | (self.fin as u8) << 2
    }

    // reserved bits (3-7) are ignored, not rejected
    pub fn from_byte(byte: u8) -> Flags {
        Flags {
            ack: byte & 0x01 != 0,
            syn: byte & 0x02 != 0,
            fin: byte & 0x04 != 0,
        }
    }

    pub fn is_data(self) -> bool {
        !self.ack && !self.syn && !self.fin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_to_byte_mapping() {
        assert_eq!(Flags { ack: true, syn: false, fin: true }.to_byte(), 0x05);
        assert_eq!(Flags { ack: false, syn: true, fin: true }.to_byte(), 0x06);
        assert_eq!(Flags { ack: false, syn: false, fin: false }.to_byte(), 0x00);
    }

    #[test]
    fn from_byte_ignores_reserved_bits() {
        let with_junk = Flags::from_byte(0xf9); // 0b1111_1001 -> ACK set, junk in bits 3-7
        assert_eq!(with_junk, Flags { ack: true, syn: false, fin: false });
    }

    #[test]
    fn round_trip() {
        for ack in [false, true] {
            for syn in [false, true] {
                for fin in [false, true] {
                    let flags = Flags { ack, syn, fin };
                    assert_eq!(Flags::from_byte(flags.to_byte()), flags);
                }
            }
        }
    }
}
