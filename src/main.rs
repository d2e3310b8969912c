use clap::Parser;
use std::io::stdout;
use std::process::ExitCode;
use tracing::{error, info};

use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::execute;

mod cli;
mod columns;
mod controller;
mod domain;
mod events;
mod expansion;
mod filter;
mod inputter;
mod logging;
mod model;
mod sort;
mod ui;
mod view;

use cli::Cli;
use controller::Controller;
use domain::{EventvConfig, EventvError};
use model::{Model, Status};
use ui::TableUI;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cli: &Cli) -> Result<(), EventvError> {
    let config = cli.to_config()?;
    logging::init(&cli.log_path()?)?;
    info!("Starting eventv!");

    let source = events::source_from_config(&config.source)?;

    let mut terminal = ratatui::init();
    execute!(stdout(), EnableMouseCapture)?;

    let size = terminal.size()?;
    let mut model = Model::init(&config, size.width as usize, size.height as usize);
    model.load(source);

    let result = event_loop(&mut terminal, &mut model, &config);

    execute!(stdout(), DisableMouseCapture)?;
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    model: &mut Model,
    config: &EventvConfig,
) -> Result<(), EventvError> {
    let mut ui = TableUI;
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }

    info!("Bye!");
    Ok(())
}
