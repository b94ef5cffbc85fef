/// Formats seconds as `m:ss`, the way the quiz timer is displayed.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
