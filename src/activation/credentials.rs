use crate::db::queries::random_code;

pub const PASSWORD_LEN: usize = 8;

/// Random hotspot password from the unambiguous code alphabet.
pub fn generate_password() -> String {
    random_code(PASSWORD_LEN)
}

fn last4(value: &str) -> &str {
    let start = value.len().saturating_sub(4);
    // Phones and codes are ASCII; fall back to the whole value otherwise
    value.get(start..).unwrap_or(value)
}

/// `FASTNET-1234-17`: last four digits of the payer's phone, then the
/// payment id. Every payment gets its own router account, even for repeat
/// buyers or phones sharing the last four digits.
pub fn payment_username(prefix: &str, phone: &str, payment_id: i64) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{}-{}-{}", prefix, last4(&digits), payment_id)
}

/// `FASTNET-V2345-3` from the last four characters of a voucher code and
/// the voucher id.
pub fn voucher_username(prefix: &str, code: &str, voucher_id: i64) -> String {
    format!("{}-V{}-{}", prefix, last4(code), voucher_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::queries::CODE_ALPHABET;

    #[test]
    fn usernames() {
        assert_eq!(payment_username("FASTNET", "256770000000", 1), "FASTNET-0000-1");
        assert_eq!(payment_username("FASTNET", "0781234567", 42), "FASTNET-4567-42");
        assert_eq!(voucher_username("FASTNET", "ABCD2345", 3), "FASTNET-V2345-3");
        assert_eq!(voucher_username("NET", "XY", 9), "NET-VXY-9");
    }

    #[test]
    fn shared_phone_suffix_gets_distinct_usernames() {
        assert_ne!(
            payment_username("FASTNET", "256771231234", 1),
            payment_username("FASTNET", "256709991234", 2)
        );
        assert_ne!(
            voucher_username("FASTNET", "AAAA2345", 1),
            voucher_username("FASTNET", "BBBB2345", 2)
        );
    }

    #[test]
    fn passwords_are_unambiguous() {
        for _ in 0..100 {
            let password = generate_password();
            assert_eq!(password.len(), PASSWORD_LEN);
            assert!(password.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }
}
