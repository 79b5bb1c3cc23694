use std::io::{self, BufRead, Write};

use voiceguard_core::pipeline::selection_channel::SelectionSender;
use voiceguard_core::profiles::voice_preset::{VoiceGroup, VoicePreset};

/// Menu entry that ends the session.
const EXIT_CHOICE: u8 = 16;

/// One parsed line of menu input.
#[derive(Debug, PartialEq)]
enum MenuAction {
    Select(VoicePreset),
    Exit,
}

/// Runs the interactive voice menu until the user exits or input ends.
///
/// The menu is printed once, then the prompt repeats. The engine is only
/// checked between prompts, so an engine failure while the menu is blocked
/// on a read surfaces after the next line of input.
pub fn run<R: BufRead>(
    mut input: R,
    selections: &SelectionSender,
    engine_finished: impl Fn() -> bool,
) -> io::Result<()> {
    print_menu();
    loop {
        if engine_finished() {
            println!("Audio engine stopped.");
            return Ok(());
        }
        print!("\nSelect voice type (1-{EXIT_CHOICE}): ");
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }
        match parse_choice(&line) {
            Ok(MenuAction::Exit) => return Ok(()),
            Ok(MenuAction::Select(preset)) => {
                selections.select(preset);
                println!("Changed to voice: {preset}");
            }
            Err(message) => println!("{message}, try again"),
        }
    }
}

fn print_menu() {
    println!();
    println!("Voice selection menu:");
    let mut group: Option<VoiceGroup> = None;
    for preset in VoicePreset::ALL {
        if group != Some(preset.group()) {
            group = Some(preset.group());
            println!();
            println!("{}:", preset.group().label());
        }
        println!("  {:2}. {}", preset.menu_number(), preset);
    }
    println!("  {EXIT_CHOICE:2}. exit");
}

fn parse_choice(line: &str) -> Result<MenuAction, String> {
    let trimmed = line.trim();
    let number: u8 = trimmed
        .parse()
        .map_err(|_| format!("'{trimmed}' is not a number between 1 and {EXIT_CHOICE}"))?;
    if number == EXIT_CHOICE {
        return Ok(MenuAction::Exit);
    }
    VoicePreset::from_menu_number(number)
        .map(MenuAction::Select)
        .ok_or_else(|| format!("{number} is not on the menu"))
}
