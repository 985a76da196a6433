use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;

/// 每日配额在太平洋时间的午夜重置，返回距离下次重置的时长以及重置时刻的本地时间
pub fn until_reset(now: DateTime<Utc>) -> (TimeDelta, DateTime<Local>) {
    let today = now.with_timezone(&Los_Angeles).date_naive();
    // 洛杉矶的夏令时切换发生在凌晨两点，午夜总是唯一存在的
    let reset = today
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| Los_Angeles.from_local_datetime(&midnight).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now + TimeDelta::days(1));
    (reset - now, reset.with_timezone(&Local))
}

/// 格式化为 `HH hr MM min`
pub fn format_duration(duration: TimeDelta) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{:02} hr {:02} min", minutes / 60, minutes % 60)
}
