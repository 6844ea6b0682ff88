//! Console player that runs compiled `.ink.json` story files written in the
//! **Ink** language.
use std::{
    cell::RefCell,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{Context, Result};
use clap::Parser;
use inkrun::story::{
    errors::{ErrorHandler, ErrorType},
    Story,
};
use rand::Rng;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The compiled .ink.json file
    json_filename: PathBuf,

    /// Choose options randomly
    #[arg(short, default_value_t = false)]
    auto_play: bool,

    /// Forbid external function fallbacks
    #[arg(short = 'e', default_value_t = false)]
    forbid_external_fallbacks: bool,
}

/// One line of player input, parsed.
enum Action {
    Choose(usize),
    Divert(String),
    Save(PathBuf),
    Load(PathBuf),
    Flow(String),
    Help,
    Quit,
}

impl Action {
    fn parse(line: &str, num_choices: usize) -> Result<Action, &'static str> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or("empty input")?;
        let arg = words.next();

        if let Ok(n) = head.parse::<usize>() {
            if (1..=num_choices).contains(&n) {
                return Ok(Action::Choose(n - 1));
            }
            return Err("option out of range");
        }

        match (head.to_lowercase().as_str(), arg) {
            ("quit" | "exit", _) => Ok(Action::Quit),
            ("help", _) => Ok(Action::Help),
            ("save", Some(f)) => Ok(Action::Save(PathBuf::from(f))),
            ("load", Some(f)) => Ok(Action::Load(PathBuf::from(f))),
            ("switch", Some(f)) => Ok(Action::Flow(f.to_string())),
            ("->", Some(p)) => Ok(Action::Divert(p.to_string())),
            ("save" | "load", None) => Err("missing filename"),
            ("switch", None) => Err("missing flow name"),
            ("->", None) => Err("missing divert path"),
            _ => Err("unrecognized option or command"),
        }
    }
}

/// Prints story errors and remembers whether a hard error occurred, so the
/// play loop can stop instead of running on in a broken state.
#[derive(Default)]
struct TermReporter {
    fatal: bool,
}

impl ErrorHandler for TermReporter {
    fn error(&mut self, message: &str, error_type: ErrorType) {
        eprintln!("{message}");

        if error_type == ErrorType::Error {
            self.fatal = true;
        }
    }
}

struct Player {
    story: Story,
    reporter: Rc<RefCell<TermReporter>>,
    auto_play: bool,
}

impl Player {
    fn new(args: &Args) -> Result<Player> {
        let raw = read_json(&args.json_filename)?;
        // inklecate output may start with a BOM
        let json = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        let mut story = Story::new(json)?;
        let reporter = Rc::new(RefCell::new(TermReporter::default()));
        story.set_error_handler(reporter.clone());
        story.set_allow_external_function_fallbacks(!args.forbid_external_fallbacks);

        Ok(Player {
            story,
            reporter,
            auto_play: args.auto_play,
        })
    }

    fn run(&mut self) -> Result<()> {
        loop {
            self.play_block()?;

            if self.reporter.borrow().fatal {
                break;
            }

            let choices = self.story.get_current_choices();
            if choices.is_empty() {
                break;
            }

            println!();
            for (i, choice) in choices.iter().enumerate() {
                println!("{}: {}", i + 1, choice.text);
            }

            let action = if self.auto_play {
                let pick = rand::thread_rng().gen_range(0..choices.len());
                println!("> {}", pick + 1);
                Action::Choose(pick)
            } else {
                match self.prompt(choices.len())? {
                    Some(action) => action,
                    None => break, // stdin closed
                }
            };

            if !self.apply(action)? {
                break;
            }
        }

        Ok(())
    }

    /// Prints story output up to the next choice point or the end.
    fn play_block(&mut self) -> Result<()> {
        while self.story.can_continue() {
            print!("{}", self.story.cont()?);

            let tags = self.story.get_current_tags()?;
            if !tags.is_empty() {
                println!("# tags: {}", tags.join(", "));
            }
        }

        Ok(())
    }

    /// Reads lines until one parses as an action. `None` means end of input.
    fn prompt(&mut self, num_choices: usize) -> Result<Option<Action>> {
        let mut line = String::new();

        loop {
            print!("> ");
            io::stdout().flush()?;

            line.clear();
            if io::stdin().read_line(&mut line)? == 0 {
                return Ok(None);
            }

            match Action::parse(&line, num_choices) {
                Ok(action) => return Ok(Some(action)),
                Err(reason) => eprintln!("<{reason}>"),
            }
        }
    }

    /// Returns false when the player asked to stop.
    fn apply(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::Choose(i) => self.story.choose_choice_index(i)?,
            Action::Quit => return Ok(false),
            Action::Help => {
                println!("Commands:\n\tload <filename>\n\tsave <filename>\n\t-> <divert_path>\n\tswitch <flow_name>\n\tquit")
            }
            Action::Save(file) => {
                fs::write(&file, self.story.save_state()?)
                    .with_context(|| format!("could not write file `{}`", file.display()))?;
                println!("Ok.");
            }
            Action::Load(file) => {
                self.story.load_state(&read_json(&file)?)?;
                println!("Ok.");
            }
            Action::Flow(flow) => {
                if let Err(desc) = self.story.switch_flow(&flow) {
                    eprintln!("<error switching to '{flow}': {desc}>");
                }
            }
            Action::Divert(path) => {
                if let Err(desc) = self.story.choose_path_string(&path, true, None) {
                    eprintln!("<error diverting to '{path}': {desc}>");
                }
            }
        }

        Ok(true)
    }
}

fn read_json(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("could not read file `{}`", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    Player::new(&args)?.run()
}
