//! Recurring calendar events that unlock seasonal items.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeasonalEvent {
    pub id: &'static str,
    /// Inclusive `(month, day)` bounds. `end` before `start` wraps the year end.
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl SeasonalEvent {
    pub fn is_active(&self, month: u32, day: u32) -> bool {
        let today = (month, day);
        if self.start <= self.end {
            self.start <= today && today <= self.end
        } else {
            today >= self.start || today <= self.end
        }
    }
}

pub const EVENT_CALENDAR: &[SeasonalEvent] = &[
    SeasonalEvent {
        id: "valentines",
        start: (2, 7),
        end: (2, 15),
    },
    SeasonalEvent {
        id: "summer_splash",
        start: (6, 21),
        end: (8, 31),
    },
    SeasonalEvent {
        id: "halloween",
        start: (10, 15),
        end: (11, 2),
    },
    SeasonalEvent {
        id: "winter_festival",
        start: (12, 1),
        end: (1, 6),
    },
];

pub fn active_events(month: u32, day: u32) -> Vec<&'static str> {
    EVENT_CALENDAR
        .iter()
        .filter(|event| event.is_active(month, day))
        .map(|event| event.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halloween_window() {
        assert_eq!(active_events(10, 31), vec!["halloween"]);
        assert_eq!(active_events(11, 2), vec!["halloween"]);
        assert!(active_events(11, 3).is_empty());
    }

    #[test]
    fn winter_festival_wraps_year_end() {
        assert_eq!(active_events(12, 24), vec!["winter_festival"]);
        assert_eq!(active_events(1, 6), vec!["winter_festival"]);
        assert!(active_events(1, 7).is_empty());
        assert!(active_events(11, 30).is_empty());
    }

    #[test]
    fn quiet_days_have_no_events() {
        assert!(active_events(4, 1).is_empty());
    }
}
