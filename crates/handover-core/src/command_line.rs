/// Strips every leading and trailing `"` or `'` from a recorded command.
pub fn remove_quotes(command: &str) -> &str {
    command.trim_matches(|ch| ch == '"' || ch == '\'')
}

/// Directory part of a recorded uninstall command, accepting either separator
/// regardless of the host.
pub fn uninstaller_directory(command: &str) -> Option<&str> {
    let path = remove_quotes(command);
    let split = path.rfind(['\\', '/'])?;
    let dir = &path[..split];
    if dir.is_empty() {
        return None;
    }
    Some(dir)
}
