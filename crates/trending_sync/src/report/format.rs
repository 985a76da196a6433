use chrono::{DateTime, TimeZone};

const UNITS: [&str; 5] = ["", "K", "M", "B", "T"];

/// 将较大的数字转换为易读的形式，例如 1234567 -> 1.2M，末尾多余的 0 会被去掉
pub fn millify(n: u64, precision: usize) -> String {
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    let mut text = format!("{value:.precision$}");
    // 四舍五入后可能进位到下一个单位，例如 999990 -> 1000.0K
    if text.parse::<f64>().is_ok_and(|v| v >= 1000.0) && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
        text = format!("{value:.precision$}");
    }
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_owned();
    }
    format!("{}{}", text, UNITS[unit])
}

pub fn timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%d/%m/%Y @ %I:%M %p").to_string()
}
