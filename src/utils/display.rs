use crate::history::{ConversationRecord, Role};
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_warning(text: &str) {
    eprintln!("{}", text.yellow().bold());
}

/// One history-panel line: star, title, last update.
pub fn conversation_line(record: &ConversationRecord) -> String {
    let star = if record.is_favorite() { "★" } else { "☆" };
    format!(
        "{} {}  ({})  [{}]",
        star,
        record.title(),
        record.updated_at().format("%Y-%m-%d %H:%M"),
        record.id()
    )
}

pub fn print_conversation(record: &ConversationRecord) {
    println!("{}", conversation_line(record));
}

pub fn print_transcript(record: &ConversationRecord) {
    print_header(&record.title());
    for turn in record.messages() {
        let stamp = turn.timestamp.format("%H:%M:%S").to_string();
        match turn.role {
            Role::User => println!("{} {} {}", stamp.dimmed(), "You:".yellow().bold(), turn.text),
            Role::Assistant => {
                println!("{} {} {}", stamp.dimmed(), "Assistant:".blue().bold(), turn.text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ConversationMode, Turn};

    #[test]
    fn test_conversation_line_marks_favorites() {
        let mut record =
            ConversationRecord::new(ConversationMode::Plain, Turn::user("hello")).unwrap();
        assert!(conversation_line(&record).starts_with("☆ hello"));

        record.set_favorite(true);
        let line = conversation_line(&record);
        assert!(line.starts_with("★ hello"));
        assert!(line.contains(record.id()));
    }
}
