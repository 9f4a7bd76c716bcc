use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

/// All timestamps are stored as naive UTC.
pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Whole seconds left before `deadline`, never negative.
pub(crate) fn remaining_seconds(deadline: PrimitiveDateTime, now: PrimitiveDateTime) -> i64 {
    (deadline - now).whole_seconds().max(0)
}

/// Wall-clock delay until `deadline` for timers; zero once it has passed.
pub(crate) fn delay_until(
    deadline: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> std::time::Duration {
    let millis = (deadline - now).whole_milliseconds();
    if millis <= 0 {
        std::time::Duration::ZERO
    } else {
        std::time::Duration::from_millis(millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Duration, Time};

    fn at(hour: u8, minute: u8, second: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, second).unwrap())
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(at(10, 20, 30)), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn remaining_seconds_clamps_at_zero() {
        let deadline = at(10, 0, 0);
        assert_eq!(remaining_seconds(deadline, at(9, 59, 0)), 60);
        assert_eq!(remaining_seconds(deadline, at(10, 0, 0)), 0);
        assert_eq!(remaining_seconds(deadline, at(10, 5, 0)), 0);
    }

    #[test]
    fn delay_until_uses_millisecond_precision() {
        let deadline = at(10, 0, 0);
        let now = deadline - Duration::milliseconds(1500);
        assert_eq!(delay_until(deadline, now), std::time::Duration::from_millis(1500));
        assert_eq!(delay_until(deadline, deadline + Duration::seconds(1)), std::time::Duration::ZERO);
    }
}
