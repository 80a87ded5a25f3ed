//! Identifiers and first-login credentials derived from an allocated sequence.

pub const SEQUENCE_WIDTH: usize = 5;
pub const DEFAULT_PROGRAM_TAG: &str = "APX2025";
pub const DEFAULT_LOGIN_DOMAIN: &str = "gmail.com";

/// Values past 99999 keep all their digits rather than wrapping.
pub fn zero_pad(seq: u64) -> String {
    format!("{:0width$}", seq, width = SEQUENCE_WIDTH)
}

pub fn admission_no(program_tag: &str, seq: u64) -> String {
    format!("{}{}", program_tag, zero_pad(seq))
}

pub fn login_id(program_tag: &str, seq: u64, login_domain: &str) -> String {
    format!(
        "{}{}@{}",
        program_tag.to_ascii_lowercase(),
        zero_pad(seq),
        login_domain
    )
}

/// Reverses the dash-separated date of birth: `dd-mm-yyyy` becomes `yyyymmdd`
/// and `yyyy-mm-dd` becomes `ddmmyyyy`.
///
/// This is a weak credential meant to be changed on first login. Downstream
/// onboarding depends on the scheme, so it is kept as-is.
pub fn initial_password(dob: &str) -> String {
    dob.trim().split('-').rev().collect::<Vec<_>>().concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_no_is_tag_plus_five_digits() {
        assert_eq!(admission_no("APX2025", 42), "APX202500042");
        assert_eq!(admission_no("APX2025", 1), "APX202500001");
        assert_eq!(admission_no("APX2025", 99_999), "APX202599999");
        assert_eq!(admission_no("APX2025", 100_000), "APX2025100000");
    }

    #[test]
    fn login_id_uses_lowercase_tag() {
        assert_eq!(
            login_id("APX2025", 42, "gmail.com"),
            "apx202500042@gmail.com"
        );
    }

    #[test]
    fn password_reverses_date_parts() {
        assert_eq!(initial_password("01-01-2015"), "20150101");
        assert_eq!(initial_password("2015-03-09"), "09032015");
        assert_eq!(initial_password(" 2015-03-09 "), "09032015");
        assert_eq!(initial_password("09032015"), "09032015");
    }
}
