use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_TIME_FORMAT: &str = "%a,%d %b %Y.%H:%M:%S";

const DAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Broken-down UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Civil {
    year: i64,
    month: usize, // 1-12
    day: i64,     // 1-31
    yday: i64,    // 0-365
    wday: usize,  // 0 = Sunday
    hour: i64,
    minute: i64,
    second: i64,
}

impl Civil {
    fn from_unix(secs: i64) -> Self {
        let days = secs.div_euclid(86400);
        let rem = secs.rem_euclid(86400);

        // days-from-civil inverse, proleptic Gregorian
        let z = days + 719468;
        let era = z.div_euclid(146097);
        let doe = z - era * 146097;
        let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + i64::from(month <= 2);

        let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
        let before: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
        let yday = before[(month - 1) as usize] + day - 1 + i64::from(leap && month > 2);

        Self {
            year,
            month: month as usize,
            day,
            yday,
            wday: (days + 4).rem_euclid(7) as usize,
            hour: rem / 3600,
            minute: rem % 3600 / 60,
            second: rem % 60,
        }
    }
}

/// `strftime`-style formatting of the common conversions.
pub fn format_time(time: SystemTime, fmt: &str) -> String {
    let secs = match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    };
    format_unix(secs, fmt)
}

fn format_unix(secs: i64, fmt: &str) -> String {
    let t = Civil::from_unix(secs);
    let mut out = String::new();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => out.push_str(&DAYS[t.wday][..3]),
            Some('A') => out.push_str(DAYS[t.wday]),
            Some('b') | Some('h') => out.push_str(&MONTHS[t.month - 1][..3]),
            Some('B') => out.push_str(MONTHS[t.month - 1]),
            Some('d') => out.push_str(&format!("{:02}", t.day)),
            Some('e') => out.push_str(&format!("{:2}", t.day)),
            Some('H') => out.push_str(&format!("{:02}", t.hour)),
            Some('I') => out.push_str(&format!("{:02}", (t.hour + 11) % 12 + 1)),
            Some('j') => out.push_str(&format!("{:03}", t.yday + 1)),
            Some('m') => out.push_str(&format!("{:02}", t.month)),
            Some('M') => out.push_str(&format!("{:02}", t.minute)),
            Some('p') => out.push_str(if t.hour < 12 { "AM" } else { "PM" }),
            Some('S') => out.push_str(&format!("{:02}", t.second)),
            Some('y') => out.push_str(&format!("{:02}", t.year.rem_euclid(100))),
            Some('Y') => out.push_str(&t.year.to_string()),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}
