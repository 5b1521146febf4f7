//! User-facing terminal output.
//! Tagged one-line messages plus colored outcome labels for the run summary.
//! Colors are only used when stdout is a TTY so piped output stays plain.

use owo_colors::OwoColorize;

use crate::report::ContainerOutcome;

fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

#[derive(Clone, Copy)]
enum Tag {
    Info,
    Warn,
    Error,
    Ok,
}

fn emit(tag: Tag, msg: &str) {
    let label = match tag {
        Tag::Info => "info:",
        Tag::Warn => "warn:",
        Tag::Error => "error:",
        Tag::Ok => "ok:",
    };
    let colored = if is_tty() {
        match tag {
            Tag::Info => label.cyan().bold().to_string(),
            Tag::Warn => label.yellow().bold().to_string(),
            Tag::Error => label.red().bold().to_string(),
            Tag::Ok => label.green().bold().to_string(),
        }
    } else {
        label.to_string()
    };
    match tag {
        Tag::Warn | Tag::Error => eprintln!("{colored} {msg}"),
        Tag::Info | Tag::Ok => println!("{colored} {msg}"),
    }
}

pub fn print_info(msg: &str) {
    emit(Tag::Info, msg);
}

pub fn print_warn(msg: &str) {
    emit(Tag::Warn, msg);
}

pub fn print_error(msg: &str) {
    emit(Tag::Error, msg);
}

pub fn print_success(msg: &str) {
    emit(Tag::Ok, msg);
}

/// Print a plain block (preview table, summary) without a prefix so it can be
/// piped or diffed.
pub fn print_user(msg: &str) {
    println!("{}", msg);
}

/// Outcome label for the summary, colored on a TTY.
pub fn outcome_label(outcome: ContainerOutcome) -> String {
    let text = outcome.as_str();
    if !is_tty() {
        return text.to_string();
    }
    match outcome {
        ContainerOutcome::Applied => text.green().to_string(),
        ContainerOutcome::Skipped => text.dimmed().to_string(),
        ContainerOutcome::Failed => text.red().to_string(),
        ContainerOutcome::PartiallyFailed => text.red().bold().to_string(),
    }
}
