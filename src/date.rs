use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

const DAY_NAMES: [&[u8; 3]; 7] = [b"Sun", b"Mon", b"Tue", b"Wed", b"Thu", b"Fri", b"Sat"];
const MONTH_NAMES: [&[u8; 3]; 12] = [
    b"Jan", b"Feb", b"Mar", b"Apr", b"May", b"Jun",
    b"Jul", b"Aug", b"Sep", b"Oct", b"Nov", b"Dec",
];

/// Create an [IMF-fixdate][rfc] for the current time, e.g.
/// `Sun, 02 Oct 2016 14:44:11 GMT`.
///
/// The formatted value is cached per thread and regenerated at most once a
/// second, the granularity of the format.
///
/// [rfc]: <https://datatracker.ietf.org/doc/html/rfc9110#section-5.6.7>
pub fn httpdate_now() -> [u8; 29] {
    thread_local! {
        static CACHE: Cell<(u64, [u8; 29])> = const { Cell::new((u64::MAX, [0; 29])) };
    }

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    CACHE.with(|cache| {
        let (at, buf) = cache.get();
        if at == secs {
            return buf;
        }
        let buf = format_secs(secs);
        cache.set((secs, buf));
        buf
    })
}

/// Create an [IMF-fixdate][rfc] for the given time.
///
/// Times before the unix epoch render as the epoch.
///
/// [rfc]: <https://datatracker.ietf.org/doc/html/rfc9110#section-5.6.7>
pub fn httpdate(v: SystemTime) -> [u8; 29] {
    format_secs(v.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs())
}

fn format_secs(secs_since_epoch: u64) -> [u8; 29] {
    // the four-digit year field runs out in 9999
    debug_assert!(secs_since_epoch < 253402300800);

    let days = (secs_since_epoch / 86400) as i64;
    let secs_of_day = secs_since_epoch % 86400;
    let (year, mon, mday) = civil_from_days(days);

    let mut buf: [u8; 29] = *b"ddd, 00 mmm 0000 00:00:00 GMT";

    // day-name; 1970-01-01 is a Thursday
    buf[..3].copy_from_slice(DAY_NAMES[((days + 4) % 7) as usize]);

    write2(&mut buf, 5, mday as u64);
    buf[8..11].copy_from_slice(MONTH_NAMES[mon as usize - 1]);

    buf[12] = b'0' + (year / 1000) as u8;
    buf[13] = b'0' + (year / 100 % 10) as u8;
    buf[14] = b'0' + (year / 10 % 10) as u8;
    buf[15] = b'0' + (year % 10) as u8;

    write2(&mut buf, 17, secs_of_day / 3600);
    write2(&mut buf, 20, secs_of_day % 3600 / 60);
    write2(&mut buf, 23, secs_of_day % 60);

    buf
}

fn write2(buf: &mut [u8; 29], at: usize, v: u64) {
    buf[at] = b'0' + (v / 10 % 10) as u8;
    buf[at + 1] = b'0' + (v % 10) as u8;
}

/// Gregorian date from days since the unix epoch, counting years from
/// 2000-03-01 so every leap-day irregularity lands at the end of a cycle.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    // days from 1970-01-01 to 2000-03-01
    const LEAPOCH: i64 = 11017;
    const DAYS_PER_400Y: i64 = 365 * 400 + 97;
    const DAYS_PER_100Y: i64 = 365 * 100 + 24;
    const DAYS_PER_4Y: i64 = 365 * 4 + 1;
    // month lengths starting in March
    const MONTH_DAYS: [i64; 12] = [31, 30, 31, 30, 31, 31, 30, 31, 30, 31, 31, 29];

    let days = days - LEAPOCH;

    let mut qc_cycles = days / DAYS_PER_400Y;
    let mut remdays = days % DAYS_PER_400Y;
    if remdays < 0 {
        remdays += DAYS_PER_400Y;
        qc_cycles -= 1;
    }

    let mut c_cycles = remdays / DAYS_PER_100Y;
    if c_cycles == 4 {
        c_cycles -= 1;
    }
    remdays -= c_cycles * DAYS_PER_100Y;

    let mut q_cycles = remdays / DAYS_PER_4Y;
    if q_cycles == 25 {
        q_cycles -= 1;
    }
    remdays -= q_cycles * DAYS_PER_4Y;

    let mut remyears = remdays / 365;
    if remyears == 4 {
        remyears -= 1;
    }
    remdays -= remyears * 365;

    let year = 2000 + remyears + 4 * q_cycles + 100 * c_cycles + 400 * qc_cycles;

    let mut mon = 0;
    while remdays >= MONTH_DAYS[mon] {
        remdays -= MONTH_DAYS[mon];
        mon += 1;
    }

    // shift from March-based back to January-based months
    let mon = mon as i64 + 3;
    if mon > 12 {
        (year + 1, mon - 12, remdays + 1)
    } else {
        (year, mon, remdays + 1)
    }
}
