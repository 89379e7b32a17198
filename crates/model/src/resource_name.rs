//! Stable, length bounded names derived from a stack and a logical resource.
//!
//! The same name identifies the schedule rule and prefixes the mailbox slots
//! of a wait, so it must be deterministic for a given stack and resource.

/// Limit imposed on EventBridge rule names.
pub const DEFAULT_MAX_LENGTH: usize = 64;

const SEPARATOR: char = '-';
const STACK_PREFIX: &str = "stack-";

/// Compose `{stack_name}-{logical_id}` restricted to `[A-Za-z0-9-]` and at most
/// `max_len` characters. Never fails; long names are shortened instead.
pub fn compose_resource_name(stack_id: &str, logical_id: &str, max_len: usize) -> String {
    let name: String = sanitize(&format!("{}{SEPARATOR}{logical_id}", stack_name(stack_id)));

    if name.len() <= max_len {
        return name;
    }

    truncate(&name, max_len)
}

/// Short stack name from a stack ARN such as
/// `arn:aws:cloudformation:eu-west-1:123456789012:stack/my-stack/<guid>`.
pub fn stack_name(stack_id: &str) -> String {
    let resource: &str = stack_id.rsplit(':').next().unwrap_or_default();
    let segments: Vec<&str> = resource.split('/').collect();
    let joined: String = segments[..segments.len() - 1].join("-");

    match joined.strip_prefix(STACK_PREFIX) {
        Some(stripped) => stripped.to_string(),
        None => joined,
    }
}

fn sanitize(raw: &str) -> String {
    let mut name: String = String::with_capacity(raw.len());

    for c in raw.chars() {
        let c: char = if c.is_ascii_alphanumeric() { c } else { SEPARATOR };
        if c == SEPARATOR && name.ends_with(SEPARATOR) {
            continue;
        }
        name.push(c);
    }

    name.trim_matches(SEPARATOR).to_string()
}

// Expects a sanitized, hence ASCII only, name.
fn truncate(name: &str, max_len: usize) -> String {
    // The last segment gets at most half the budget
    let tail_budget: usize = max_len - max_len / 2;
    let tail: &str = name.rsplit(SEPARATOR).next().unwrap_or(name);
    let tail: &str = &tail[..tail.len().min(tail_budget)];

    let head_budget: usize = max_len.saturating_sub(tail.len() + 1);
    let head: &str = name[..head_budget].trim_end_matches(SEPARATOR);

    if head.is_empty() {
        return tail.to_string();
    }

    format!("{head}{SEPARATOR}{tail}")
}
