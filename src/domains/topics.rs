//! `robots/{id}/{channel}` topic helpers shared by the bus adapters.

pub const ROBOT_TOPIC_ROOT: &str = "robots";

pub fn robot_topic(robot_id: i64, channel: &str) -> String {
    format!("{}/{}/{}", ROBOT_TOPIC_ROOT, robot_id, channel)
}

/// Subscription pattern for one channel of every robot.
pub fn any_robot_topic(channel: &str) -> String {
    format!("{}/+/{}", ROBOT_TOPIC_ROOT, channel)
}

/// Splits `robots/{id}/{channel}` into its id and channel.
pub fn parse_robot_topic(topic: &str) -> Option<(i64, &str)> {
    let mut parts = topic.splitn(3, '/');
    if parts.next()? != ROBOT_TOPIC_ROOT {
        return None;
    }
    let robot_id = parts.next()?.parse().ok()?;
    let channel = parts.next().filter(|c| !c.is_empty() && !c.contains('/'))?;
    Some((robot_id, channel))
}

/// MQTT-style matching: `+` matches exactly one level, a trailing `#`
/// matches the rest (including nothing).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return pattern_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
