//! Line-oriented terminal front end for a check-in session.

use anyhow::Result;
use opticheck_core::{FaceEncoder, MatchResult};
use opticheck_hw::V4lDevice;
use opticheck_workflow::{
    verify_identity, Action, Config, FieldValue, Notice, NoticeLevel, ProfileSchema, SessionState, SheetFile,
    SimulatedVitals, Stage, VerifyError, Workflow,
};
use std::io::{self, BufRead, Write};
use std::time::Duration;

const SCAN_STATUS: [&str; 5] = [
    "Detecting face...",
    "Measuring heart rate...",
    "Estimating blood pressure...",
    "Checking respiratory rate...",
    "Analyzing stress indicators...",
];

enum Step {
    Act(Action),
    Redraw,
    Quit,
}

/// Run sessions until the user quits or stdin closes.
pub fn run<E: FaceEncoder>(config: &Config, mut encoder: E) -> Result<()> {
    let mut device = V4lDevice::new(config.camera_index);
    let mut workflow = Workflow::new(
        SheetFile::new(&config.store_path),
        SimulatedVitals,
        ProfileSchema::builtin()?,
    );
    let mut state = SessionState::new();
    let mut input = io::stdin().lock();

    loop {
        render(&state);
        let step = match state.stage() {
            Stage::Verifying => match prompt(&mut input, "[Enter] start face recognition  [q] quit")?.as_deref() {
                None | Some("q") => Step::Quit,
                Some(_) => {
                    println!("Look at the camera...");
                    let attempt = verify_identity(&mut device, &mut encoder, &config.gallery_dir, &config.match_settings());
                    confirm_identity(&mut input, attempt)?
                }
            },
            Stage::ProfileView => match prompt(&mut input, "[e] edit profile  [s] start scan  [x] end session")?.as_deref() {
                None => Step::Quit,
                Some("e") => Step::Act(Action::Edit),
                Some("s") => Step::Act(Action::Scan),
                Some("x") => Step::Act(Action::EndSession),
                Some(_) => Step::Redraw,
            },
            Stage::ProfileEdit => edit_profile(&mut input, &state)?,
            Stage::Scanning => match prompt(&mut input, "[Enter] begin scan  [b] back  [x] end session")?.as_deref() {
                None => Step::Quit,
                Some("b") => Step::Act(Action::Back),
                Some("x") => Step::Act(Action::EndSession),
                Some(_) => {
                    scan(config.scan_duration());
                    Step::Act(Action::ScanElapsed)
                }
            },
            Stage::Report => match prompt(&mut input, "[c] complete check-in  [r] start over  [x] end session  [q] quit")?
                .as_deref()
            {
                None | Some("q") => Step::Quit,
                Some("c") => Step::Act(Action::CompleteCheckIn),
                Some("r") => Step::Act(Action::StartOver),
                Some("x") => Step::Act(Action::EndSession),
                Some(_) => Step::Redraw,
            },
        };

        match step {
            Step::Quit => break,
            Step::Redraw => continue,
            Step::Act(action) => match workflow.apply(&mut state, action) {
                Ok(outcome) => print_notices(&outcome.notices),
                Err(e) => println!("! {e}"),
            },
        }
    }

    Ok(())
}

fn prompt(input: &mut impl BufRead, text: &str) -> Result<Option<String>> {
    print!("{text}\n> ");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_ascii_lowercase()))
}

/// Ask the user to confirm a recognized label before the profile is loaded.
/// A rejected match stays on the verification screen.
fn confirm_identity(input: &mut impl BufRead, attempt: Result<MatchResult, VerifyError>) -> Result<Step> {
    let result = match attempt {
        Ok(result) if result.is_known() => result,
        other => return Ok(Step::Act(other.into())),
    };

    let question = format!(
        "We detected you as {}. Is this correct?\n[y] yes, that's me  [n] no, that's not me",
        result.display_label()
    );
    match prompt(input, &question)?.as_deref() {
        None => Ok(Step::Quit),
        Some("n") => {
            let mut notices: Vec<Notice> = result.warnings.iter().map(Notice::warning).collect();
            notices.push(Notice::info("Let's try again. Make sure your face is clearly visible."));
            print_notices(&notices);
            Ok(Step::Redraw)
        }
        Some(_) => Ok(Step::Act(Action::Recognized(result))),
    }
}

fn edit_profile(input: &mut impl BufRead, state: &SessionState) -> Result<Step> {
    let Some(form) = state.edit_form() else {
        return Ok(Step::Act(Action::CancelEdit));
    };
    println!("Press Enter to keep a value.");

    let mut edits = Vec::new();
    for (name, current) in form {
        print!("{name} [{current}]: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Step::Quit);
        }
        let value = line.trim();
        if !value.is_empty() {
            edits.push((name, FieldValue::Text(value.to_string())));
        }
    }

    match prompt(input, "[s] save  [c] cancel  [x] end session")?.as_deref() {
        None => Ok(Step::Quit),
        Some("s") => Ok(Step::Act(Action::SubmitEdits(edits))),
        Some("x") => Ok(Step::Act(Action::EndSession)),
        Some(_) => Ok(Step::Act(Action::CancelEdit)),
    }
}

fn scan(duration: Duration) {
    let steps = SCAN_STATUS.len() as u32;
    for status in SCAN_STATUS {
        println!("  {status}");
        std::thread::sleep(duration / steps);
    }
}

fn render(state: &SessionState) {
    println!();
    match state.stage() {
        Stage::Verifying => println!("== Face verification =="),
        Stage::ProfileView | Stage::ProfileEdit => {
            println!("== Profile: {} ==", state.identity().unwrap_or_default());
            if state.stage() == Stage::ProfileView {
                if let Some(profile) = state.profile() {
                    for (name, value) in profile.fields() {
                        println!("  {name:<20} {value}");
                    }
                }
            }
        }
        Stage::Scanning => {
            println!("== Vitals scan ==");
            println!("  Sit still and face the camera.");
        }
        Stage::Report => {
            println!("== Health report: {} ==", state.identity().unwrap_or_default());
            if let Some(v) = state.vitals() {
                println!("  {:<20} {} bpm", "Heart rate", v.heart_rate);
                println!("  {:<20} {} mmHg", "Blood pressure", v.blood_pressure);
                println!("  {:<20} {} breaths/min", "Respiratory rate", v.respiratory_rate);
                println!("  {:<20} {}", "Stress level", v.stress_level);
                println!("  {:<20} {}", "BMI", v.bmi);
                println!("  {:<20} {}%", "Oxygen saturation", v.oxygen_saturation);
            }
            println!("  Insights:");
            for insight in state.insights() {
                println!("   - {insight}");
            }
            if state.check_in_complete() {
                println!("  Check-in complete.");
            }
        }
    }
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        println!("[{tag}] {}", notice.message);
    }
}
