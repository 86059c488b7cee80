use anyhow::{Context, Result, bail};
use docsession_config::Config;
use docsession_engine::{
    EditorController, EditorEventKind, HeadlessFrontend, ImageParams, MemoryEngine, SessionEvent,
    SessionSignal, StepPosition, StructuredContent, StyleId, headless_chrome,
};
use futures::executor::block_on;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::{env, process};

const HELP: &str = "\
commands:
  show                       list paragraphs with their styles
  select <from> [<to>]       move the cursor, selecting from <from> to <to>
  style <style-id>           set the paragraph style of the selection
  clone <style-id> <name>    copy a style under a new display name
  delete <style-id>          remove a style
  styles                     list paragraph styles
  fonts                      list declared and available fonts
  table <rows> <columns>     insert a table at the cursor
  image <href> <w> <h>       insert an image at the cursor
  meta <key> [<value>]       set (or remove) a metadata property
  undo | redo
  quit";

enum Flow {
    Continue,
    Quit,
}

fn print_event(event: &SessionEvent) {
    println!("  > {event:?}");
}

fn parse_position(arg: Option<&str>) -> Result<StepPosition> {
    let arg = arg.context("missing position")?;
    let step = arg
        .parse::<u64>()
        .with_context(|| format!("'{arg}' is not a step position"))?;
    Ok(StepPosition(step))
}

fn show_document(engine: &MemoryEngine) {
    let document = engine.document();
    for paragraph in &document.paragraphs {
        let style = if paragraph.style.is_default() {
            "(default)".to_string()
        } else {
            paragraph.style.to_string()
        };
        println!("{:>3} [{style}] {}", paragraph.id.0, paragraph.text);
    }
}

fn run_command(editor: &EditorController, engine: &MemoryEngine, line: &str) -> Result<Flow> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Flow::Continue);
    };

    match command {
        "quit" | "exit" => return Ok(Flow::Quit),
        "help" => println!("{HELP}"),
        "show" => show_document(engine),
        "select" => {
            let anchor = parse_position(words.next())?;
            let position = match words.next() {
                Some(to) => parse_position(Some(to))?,
                None => anchor,
            };
            editor.session()?.move_cursor(position, anchor)?;
        }
        "style" => {
            let style = StyleId::from(words.next().unwrap_or_default());
            let count = editor.session()?.set_paragraph_style(&style)?;
            println!("{count} paragraph(s) restyled");
        }
        "clone" => {
            let source = StyleId::from(words.next().context("missing source style")?);
            let name = words.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                bail!("missing display name");
            }
            let new_id = editor.session()?.clone_style(&source, &name)?;
            println!("created {new_id}");
        }
        "delete" => {
            let style = StyleId::from(words.next().context("missing style")?);
            editor.session()?.delete_style(&style)?;
        }
        "styles" => {
            let session = editor.session()?;
            let current = session.current_paragraph_style();
            for style in session.available_paragraph_styles() {
                let marker = if current.as_ref() == Some(&style.id) { "*" } else { " " };
                println!("{marker} {} ({})", style.id, style.display_name);
            }
        }
        "fonts" => {
            let session = editor.session()?;
            for font in session.declared_fonts() {
                println!("declared  {} ({})", font.name, font.family);
            }
            for family in session.available_fonts() {
                println!("available {family}");
            }
        }
        "table" => {
            let rows = words.next().context("missing rows")?.parse()?;
            let columns = words.next().context("missing columns")?.parse()?;
            editor.session()?.insert_table(rows, columns, None, None, None)?;
        }
        "image" => {
            let href = words.next().context("missing href")?.to_string();
            let width = words.next().context("missing width")?.parse()?;
            let height = words.next().context("missing height")?.parse()?;
            editor
                .session()?
                .insert_structured_content(StructuredContent::Image(ImageParams {
                    href,
                    width,
                    height,
                }))?;
        }
        "meta" => {
            let key = words.next().context("missing key")?.to_string();
            let value = words.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                editor.set_metadata(BTreeMap::new(), vec![key])?;
            } else {
                editor.set_metadata(BTreeMap::from([(key, value)]), Vec::new())?;
            }
        }
        "undo" => println!("undone: {}", editor.session()?.undo()),
        "redo" => println!("redone: {}", editor.session()?.redo()),
        other => bail!("unknown command '{other}', try 'help'"),
    }
    Ok(Flow::Continue)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <document-path>", args[0]);
        process::exit(1);
    }
    let document_path = &args[1];

    let config = match Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };
    let fonts_css = config.load_fonts_css()?;

    let engine = Rc::new(MemoryEngine::new());
    let mut editor = EditorController::new(
        engine.clone(),
        Box::new(HeadlessFrontend),
        headless_chrome(),
        config.editor.clone(),
        config.local_member_id(),
        config.user.clone(),
    )
    .with_fonts_css(fonts_css);

    editor.subscribe(EditorEventKind::DocumentModifiedChanged, |event| {
        println!("  > {event:?}")
    })?;
    editor.subscribe(EditorEventKind::UnknownError, |event| {
        eprintln!("  ! {event:?}")
    })?;

    block_on(editor.open_document_from_url(document_path))
        .with_context(|| format!("could not open {document_path}"))?;
    engine.flush();
    for signal in SessionSignal::ALL {
        editor.session()?.subscribe(signal, print_event)?;
    }
    log::info!("editing {document_path} as {}", editor.member_id());
    println!("{HELP}");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match run_command(&editor, &engine, line.trim()) {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("Error: {e:#}"),
        }
        engine.flush();
    }

    block_on(editor.close_document())?;
    block_on(editor.destroy())?;
    Ok(())
}
