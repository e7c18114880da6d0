//! A [`View`] that renders the transcript as a chat log on stdout.

use std::io::{self, IsTerminal, Stdout, Write};
use std::time::Duration;

use echo_chat_core::transcript::{Message, Sender, Transcript};
use echo_chat_core::view::View;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

const BAR_CHAR: &str = "▎";
const PROMPT: &str = "> ";

/// Horizontal placement of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    /// Assistant messages.
    Left,
    /// User messages.
    Right,
}

/// Lays out `msg` as plain lines for a terminal `width` columns wide.
///
/// Text wraps at three quarters of the width. User lines are padded so that
/// they end at the right edge; assistant lines start with a bar.
pub fn layout_message(msg: &Message, width: usize) -> (Align, Vec<String>) {
    let bubble_width = (width / 4 * 3).max(1);
    let wrapped = msg
        .text()
        .lines()
        .flat_map(|line| {
            if line.is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(line, bubble_width)
                    .into_iter()
                    .map(|l| l.into_owned())
                    .collect()
            }
        })
        .collect::<Vec<_>>();

    match msg.sender() {
        Sender::User => {
            let lines = wrapped
                .into_iter()
                .map(|line| format!("{line:>width$}"))
                .collect();
            (Align::Right, lines)
        }
        Sender::Assistant => {
            let lines = wrapped
                .into_iter()
                .map(|line| format!("{BAR_CHAR} {line}"))
                .collect();
            (Align::Left, lines)
        }
    }
}

/// Prints the input prompt.
pub fn print_prompt() {
    write_prompt(&mut io::stdout());
}

fn write_prompt<W: Write>(out: &mut W) {
    write!(out, "{PROMPT}").ok();
    out.flush().ok();
}

/// Renders a chat session in the terminal.
///
/// Messages are printed once, as soon as they are final. The placeholder is
/// shown as a spinner that disappears when the reply arrives.
pub struct TerminalView<W = Stdout> {
    out: W,
    width: usize,
    printed: usize,
    spinner: Option<ProgressBar>,
    spinner_style: ProgressStyle,
    draw_spinner: bool,
    interactive: bool,
}

impl TerminalView {
    /// Creates a view for a terminal `width` columns wide.
    pub fn new(width: usize) -> Self {
        let mut view = Self::with_writer(io::stdout(), width);
        view.draw_spinner = true;
        // Erasing the typed line only makes sense when it was echoed by
        // the terminal we print to.
        view.interactive =
            io::stdin().is_terminal() && io::stdout().is_terminal();
        view
    }
}

impl<W: Write> TerminalView<W> {
    /// Creates a view that writes to `out`. The spinner is not drawn.
    pub fn with_writer(out: W, width: usize) -> Self {
        let spinner_style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        Self {
            out,
            width,
            printed: 0,
            spinner: None,
            spinner_style,
            draw_spinner: false,
            interactive: false,
        }
    }

    fn print_message(&mut self, msg: &Message) {
        let (_, lines) = layout_message(msg, self.width);
        for line in lines {
            if msg.is_error() {
                writeln!(self.out, "{}", line.red()).ok();
            } else {
                match msg.sender() {
                    Sender::User => {
                        writeln!(self.out, "{}", line.bright_cyan()).ok()
                    }
                    Sender::Assistant => {
                        writeln!(self.out, "{}", line.bright_white()).ok()
                    }
                };
            }
        }
        writeln!(self.out).ok();
    }

    fn start_spinner(&mut self) {
        let spinner = if self.draw_spinner {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        spinner.set_style(self.spinner_style.clone());
        spinner.set_message(echo_chat_core::transcript::PLACEHOLDER_TEXT);
        if self.draw_spinner {
            spinner.enable_steady_tick(Duration::from_millis(100));
        }
        self.spinner = Some(spinner);
    }
}

impl<W: Write + Send + 'static> View for TerminalView<W> {
    fn clear_input(&mut self) {
        // The typed line is still on screen. Erase it so the message only
        // shows up once, in its bubble.
        if self.interactive {
            write!(self.out, "\x1b[1A\x1b[2K").ok();
            self.out.flush().ok();
        }
    }

    fn refresh(&mut self, transcript: &Transcript) {
        let pending = transcript.iter().any(Message::is_placeholder);

        // Finish the spinner before printing anything else.
        if !pending {
            if let Some(spinner) = self.spinner.take() {
                spinner.finish_and_clear();
            }
        }

        let new_messages = transcript
            .iter()
            .filter(|m| !m.is_placeholder())
            .skip(self.printed)
            .collect::<Vec<_>>();
        for msg in &new_messages {
            self.print_message(msg);
        }
        self.printed += new_messages.len();
        self.out.flush().ok();

        if pending && self.spinner.is_none() {
            self.start_spinner();
        }
    }

    fn focus_input(&mut self) {
        write_prompt(&mut self.out);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use echo_chat_core::ControllerBuilder;
    use echo_chat_simulated_model::SimulatedProvider;
    use tokio::sync::watch;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Hands calls to a shared [`TerminalView`] and notes whether its
    /// spinner is running after each refresh.
    #[derive(Clone)]
    struct SharedView {
        view: Arc<Mutex<TerminalView<SharedBuf>>>,
        spinner_states: Arc<Mutex<Vec<bool>>>,
    }

    impl View for SharedView {
        fn clear_input(&mut self) {
            self.view.lock().unwrap().clear_input();
        }

        fn refresh(&mut self, transcript: &Transcript) {
            let mut view = self.view.lock().unwrap();
            view.refresh(transcript);
            self.spinner_states
                .lock()
                .unwrap()
                .push(view.spinner.is_some());
        }

        fn focus_input(&mut self) {
            self.view.lock().unwrap().focus_input();
        }
    }

    #[test]
    fn test_user_messages_are_right_aligned() {
        let (align, lines) = layout_message(&Message::user("hello"), 40);
        assert_eq!(align, Align::Right);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 40);
        assert!(lines[0].ends_with("hello"));
        assert!(lines[0].starts_with(' '));
    }

    #[test]
    fn test_assistant_messages_are_left_aligned() {
        let (align, lines) =
            layout_message(&Message::assistant("hi there"), 40);
        assert_eq!(align, Align::Left);
        assert_eq!(lines, ["▎ hi there"]);
    }

    #[test]
    fn test_long_messages_wrap() {
        let text = "lorem ipsum dolor sit amet ".repeat(4);
        let (_, lines) = layout_message(&Message::assistant(text.trim()), 40);
        assert!(lines.len() > 1);
        for line in &lines {
            let body = line.strip_prefix("▎ ").unwrap();
            assert!(body.chars().count() <= 30, "{line:?}");
        }
    }

    #[test]
    fn test_blank_lines_are_kept() {
        let (_, lines) =
            layout_message(&Message::assistant("first\n\nsecond"), 40);
        assert_eq!(lines, ["▎ first", "▎ ", "▎ second"]);
    }

    #[test]
    fn test_huge_width_does_not_overflow() {
        let (_, lines) =
            layout_message(&Message::assistant("hi"), usize::MAX / 2);
        assert_eq!(lines, ["▎ hi"]);
    }

    #[test]
    fn test_piped_output_is_not_erased() {
        let out = SharedBuf::default();
        let mut view = TerminalView::with_writer(out.clone(), 40);
        view.clear_input();
        assert_eq!(out.contents(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_message_is_printed_once() {
        let out = SharedBuf::default();
        let shared = SharedView {
            view: Arc::new(Mutex::new(TerminalView::with_writer(
                out.clone(),
                40,
            ))),
            spinner_states: Default::default(),
        };
        let (idle_tx, mut idle_rx) = watch::channel(0usize);
        let controller = ControllerBuilder::with_model_provider(
            SimulatedProvider::default(),
        )
        .with_view(shared.clone())
        .on_idle(move || {
            idle_tx.send_modify(|count| *count += 1);
        })
        .build();

        controller.submit("ping").await.unwrap();
        idle_rx.wait_for(|count| *count >= 1).await.unwrap();
        controller.submit("pong").await.unwrap();
        idle_rx.wait_for(|count| *count >= 2).await.unwrap();

        let contents = out.contents();
        assert_eq!(contents.matches("ping").count(), 2, "{contents}");
        assert_eq!(contents.matches("pong").count(), 2, "{contents}");
        assert_eq!(contents.matches("Received your message").count(), 2);
        assert_eq!(contents.matches(PROMPT).count(), 2);
        assert!(!contents.contains(echo_chat_core::transcript::PLACEHOLDER_TEXT));

        // Refreshes per exchange: before, user, placeholder, reply.
        assert_eq!(
            *shared.spinner_states.lock().unwrap(),
            [false, false, true, false, false, false, true, false]
        );
        assert_eq!(shared.view.lock().unwrap().printed, 4);
    }
}
