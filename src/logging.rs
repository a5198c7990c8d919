use std::fmt::{self, Display};

use colored::{Color, ColoredString, Colorize};
use log::{Level, LevelFilter, SetLoggerError};

/// Crates of this workspace, with the tag and color their lines carry.
/// Anything else is a dependency and only gets to print warnings and errors.
const WORKSPACE: [(&str, &str, Color); 4] = [
    ("driftline", "MAIN", Color::BrightWhite),
    ("driftline_core", "CORE", Color::Blue),
    ("driftline_collab", "COLLAB", Color::BrightMagenta),
    ("driftline_server", "SERVER", Color::BrightGreen),
];

pub fn init_logger() -> Result<(), SetLoggerError> {
    let dispatch = fern::Dispatch::new()
        .level(LevelFilter::Warn)
        .format(|out, message, record| {
            let time = chrono::Local::now().format("%H:%M:%S%.3f").to_string();

            out.finish(format_args!(
                "{} {} {:<8} {}",
                time.dimmed(),
                badge(record.level()),
                Origin::of(record.target()),
                message
            ))
        });

    WORKSPACE
        .iter()
        .fold(dispatch, |dispatch, (name, _, _)| {
            dispatch.level_for(*name, LevelFilter::Info)
        })
        .chain(std::io::stdout())
        .apply()
}

/// Where a log line comes from, judged by the crate part of its target
#[derive(Debug, PartialEq)]
enum Origin<'a> {
    Workspace { tag: &'static str, color: Color },
    Dependency(&'a str),
}

impl<'a> Origin<'a> {
    fn of(target: &'a str) -> Self {
        let name = target.split("::").next().unwrap_or(target);

        WORKSPACE
            .iter()
            .find(|(candidate, _, _)| *candidate == name)
            .map(|(_, tag, color)| Origin::Workspace { tag: *tag, color: *color })
            .unwrap_or(Origin::Dependency(name))
    }
}

impl Display for Origin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Origin::Workspace { tag, color } => tag.color(*color).bold(),
            Origin::Dependency(name) => name.italic(),
        };

        Display::fmt(&label, f)
    }
}

fn badge(level: Level) -> ColoredString {
    let (label, background) = match level {
        Level::Error => ("ERR", Color::Red),
        Level::Warn => ("WRN", Color::Yellow),
        Level::Info => ("INF", Color::Blue),
        Level::Debug => ("DBG", Color::Magenta),
        Level::Trace => ("TRC", Color::BrightBlack),
    };

    format!(" {label} ").black().on_color(background)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_origin_of_target() {
        assert_eq!(
            Origin::of("driftline_collab::rooms::room"),
            Origin::Workspace {
                tag: "COLLAB",
                color: Color::BrightMagenta
            }
        );
        assert!(matches!(
            Origin::of("driftline"),
            Origin::Workspace { tag: "MAIN", .. }
        ));
        assert_eq!(Origin::of("hyper::proto::h1"), Origin::Dependency("hyper"));
        assert_eq!(Origin::of("driftline_extra"), Origin::Dependency("driftline_extra"));
    }

    #[test]
    fn test_badges_keep_their_label() {
        colored::control::set_override(false);

        assert_eq!(badge(Level::Warn).to_string(), " WRN ");
        assert_eq!(Origin::of("reqwest::async_impl").to_string(), "reqwest");
    }
}
