/// Banner printed by the inspector on start-up.
pub fn welcome_message(name: &str) -> String {
    let rule = "=".repeat(name.len() + 8);
    format!(
        "{rule}\n    {name}\n{rule}\nversion {}\nType 'help' for the list of commands.",
        env!("CARGO_PKG_VERSION")
    )
}
