use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

//rule deciding which day of a month a monthly contract expires on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryRule {
    //cme monthly crypto and metals contracts
    #[default]
    LastFriday,
    //month-end convention
    LastCalendarDay,
}

impl ExpiryRule {
    //parse expiry rule from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "last_friday" | "friday" | "cme" => Some(ExpiryRule::LastFriday),
            "last_calendar_day" | "month_end" | "eom" => Some(ExpiryRule::LastCalendarDay),
            _ => None,
        }
    }

    //expiry date for a calendar month, none for an invalid month
    pub fn expiry_for_month(&self, year: i32, month: u32) -> Option<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let last = first.checked_add_months(Months::new(1))?.pred_opt()?;

        match self {
            ExpiryRule::LastCalendarDay => Some(last),
            ExpiryRule::LastFriday => {
                let from_monday = last.weekday().num_days_from_monday() as i64;
                let friday = Weekday::Fri.num_days_from_monday() as i64;
                let days_back = (from_monday - friday).rem_euclid(7);
                Some(last - Duration::days(days_back))
            }
        }
    }
}

//a calendar month identifying one contract in the monthly cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractMonth {
    pub year: i32,
    pub month: u32,
}

impl ContractMonth {
    pub fn of(date: NaiveDate) -> Self {
        ContractMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            ContractMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            ContractMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for ContractMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

//one contract of the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractExpiry {
    pub month: ContractMonth,
    pub expiry: NaiveDate,
}

//ordered monthly expiry schedule
//entries are strictly increasing and the schedule only ever grows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSchedule {
    rule: ExpiryRule,
    entries: Vec<ContractExpiry>,
}

impl ContractSchedule {
    //creates an empty schedule that fills itself on first lookup
    pub fn new(rule: ExpiryRule) -> Self {
        ContractSchedule {
            rule,
            entries: Vec::new(),
        }
    }

    pub fn rule(&self) -> ExpiryRule {
        self.rule
    }

    pub fn entries(&self) -> &[ContractExpiry] {
        &self.entries
    }

    pub fn expiries(&self) -> Vec<NaiveDate> {
        self.entries.iter().map(|e| e.expiry).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    //returns the front-month contract for a date
    //roll-on-expiry: on the expiry date itself the following month is already front month
    pub fn front_month_for(&mut self, date: NaiveDate) -> ContractExpiry {
        self.cover_from(ContractMonth::of(date));
        self.extend_past(date);

        let idx = self.entries.partition_point(|e| e.expiry <= date);
        match self.entries.get(idx).or_else(|| self.entries.last()) {
            Some(entry) => *entry,
            //calendar overflow, nothing representable to roll into
            None => ContractExpiry {
                month: ContractMonth::of(date),
                expiry: date,
            },
        }
    }

    //front-month expiry date for a date
    pub fn front_month_expiry(&mut self, date: NaiveDate) -> NaiveDate {
        self.front_month_for(date).expiry
    }

    //makes sure the schedule starts no later than the given month
    fn cover_from(&mut self, month: ContractMonth) {
        let first = match self.entries.first() {
            Some(entry) if entry.month <= month => return,
            Some(entry) => entry.month,
            None => {
                self.push_month(month);
                return;
            }
        };

        let mut prefix = Vec::new();
        let mut current = month;
        while current < first {
            if let Some(expiry) = self.rule.expiry_for_month(current.year, current.month) {
                prefix.push(ContractExpiry {
                    month: current,
                    expiry,
                });
            }
            current = current.next();
        }
        prefix.append(&mut self.entries);
        self.entries = prefix;
    }

    //appends months until some expiry lies strictly after the date
    fn extend_past(&mut self, date: NaiveDate) {
        while let Some(last) = self.entries.last().copied() {
            if last.expiry > date {
                break;
            }
            if !self.push_month(last.month.next()) {
                break;
            }
        }
    }

    fn push_month(&mut self, month: ContractMonth) -> bool {
        match self.rule.expiry_for_month(month.year, month.month) {
            Some(expiry) => {
                self.entries.push(ContractExpiry { month, expiry });
                true
            }
            None => false,
        }
    }
}

//generates one expiry per calendar month from the month of start through the month of end
pub fn generate_schedule(start: NaiveDate, end: NaiveDate, rule: ExpiryRule) -> ContractSchedule {
    let mut schedule = ContractSchedule::new(rule);
    let last = ContractMonth::of(end);
    let mut current = ContractMonth::of(start);

    while current <= last {
        if !schedule.push_month(current) {
            break;
        }
        current = current.next();
    }

    schedule
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn last_friday_of_known_months() {
        let rule = ExpiryRule::LastFriday;
        assert_eq!(rule.expiry_for_month(2024, 1), Some(d(2024, 1, 26)));
        assert_eq!(rule.expiry_for_month(2024, 2), Some(d(2024, 2, 23)));
        assert_eq!(rule.expiry_for_month(2024, 5), Some(d(2024, 5, 31)));
        assert_eq!(rule.expiry_for_month(2024, 12), Some(d(2024, 12, 27)));
        assert_eq!(rule.expiry_for_month(2024, 13), None);
    }

    #[test]
    fn schedule_is_strictly_increasing_last_fridays() {
        let schedule = generate_schedule(d(2023, 11, 5), d(2026, 2, 1), ExpiryRule::LastFriday);
        let expiries = schedule.expiries();

        assert_eq!(expiries.len(), 28);
        for pair in expiries.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for expiry in &expiries {
            assert_eq!(expiry.weekday(), Weekday::Fri);
            //a week later is already next month
            assert_ne!((*expiry + Duration::days(7)).month(), expiry.month());
        }
    }

    #[test]
    fn schedule_generation_is_restartable() {
        let a = generate_schedule(d(2024, 1, 1), d(2024, 12, 31), ExpiryRule::LastFriday);
        let b = generate_schedule(d(2024, 1, 1), d(2024, 12, 31), ExpiryRule::LastFriday);
        assert_eq!(a.expiries(), b.expiries());
    }

    #[test]
    fn month_end_roll_happens_on_expiry_date() {
        let mut schedule =
            generate_schedule(d(2024, 1, 1), d(2024, 3, 31), ExpiryRule::LastCalendarDay);

        assert_eq!(schedule.front_month_expiry(d(2024, 1, 15)), d(2024, 1, 31));
        assert_eq!(schedule.front_month_expiry(d(2024, 1, 30)), d(2024, 1, 31));
        assert_eq!(schedule.front_month_expiry(d(2024, 1, 31)), d(2024, 2, 29));
    }

    #[test]
    fn last_friday_roll_happens_on_expiry_date() {
        let mut schedule = generate_schedule(d(2024, 1, 1), d(2024, 2, 28), ExpiryRule::LastFriday);

        assert_eq!(schedule.front_month_expiry(d(2024, 1, 25)), d(2024, 1, 26));
        assert_eq!(schedule.front_month_expiry(d(2024, 1, 26)), d(2024, 2, 23));
        assert_eq!(schedule.front_month_expiry(d(2024, 1, 27)), d(2024, 2, 23));
    }

    #[test]
    fn lookup_past_the_end_extends_the_schedule() {
        let mut schedule = generate_schedule(d(2024, 1, 1), d(2024, 1, 31), ExpiryRule::LastFriday);
        assert_eq!(schedule.len(), 1);

        let front = schedule.front_month_for(d(2024, 6, 10));
        assert_eq!(front.expiry, d(2024, 6, 28));
        assert_eq!(front.month.to_string(), "2024-06");
        assert_eq!(schedule.len(), 6);
    }

    #[test]
    fn lookup_before_the_start_backfills_in_order() {
        let mut schedule = generate_schedule(d(2024, 6, 1), d(2024, 6, 30), ExpiryRule::LastFriday);
        assert_eq!(schedule.front_month_expiry(d(2024, 3, 1)), d(2024, 3, 29));

        let expiries = schedule.expiries();
        assert_eq!(expiries.first(), Some(&d(2024, 3, 29)));
        for pair in expiries.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn empty_schedule_seeds_itself() {
        let mut schedule = ContractSchedule::new(ExpiryRule::LastCalendarDay);
        assert!(schedule.is_empty());
        assert_eq!(schedule.front_month_expiry(d(2024, 12, 31)), d(2025, 1, 31));
    }

    #[test]
    fn parse_rule_names() {
        assert_eq!(ExpiryRule::parse("CME"), Some(ExpiryRule::LastFriday));
        assert_eq!(ExpiryRule::parse("month_end"), Some(ExpiryRule::LastCalendarDay));
        assert_eq!(ExpiryRule::parse("quarterly"), None);
    }
}
