use time::OffsetDateTime;

/// The current instant in UTC.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn now_is_utc_and_recent() {
        let now = now();
        assert!(now.offset().is_utc());
        assert!(now > datetime!(2024-01-01 00:00:00 UTC));
    }
}
