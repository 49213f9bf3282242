//! Alert message formatting

/// Renders a run length as `N小时N分钟N秒`, skipping zero units
pub fn format_duration(run_seconds: f64) -> String {
    let total = if run_seconds.is_finite() && run_seconds > 0.0 {
        run_seconds.ceil() as u64
    } else {
        0
    };

    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;

    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}小时", h));
    }
    if m > 0 {
        out.push_str(&format!("{}分钟", m));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{}秒", s));
    }
    out
}

/// Fills `{{name}}` and `{{time}}` in the alert template
pub fn format_message(template: &str, name: &str, run_seconds: f64) -> String {
    template
        .replace("{{name}}", name)
        .replace("{{time}}", &format_duration(run_seconds))
}
