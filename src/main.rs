use anyhow::{bail, Result};
use clap::Parser;
use log::{debug, info};
use serde_json::{json, Value};

use scenedeck::cli::{self, Args};
use scenedeck::config::RuntimeConfig;
use scenedeck::core::event_bus::{downcast_event, BoxedEvent};
use scenedeck::entities::scene_events::*;
use scenedeck::entities::{Presentation, PresentationDoc, SlideRef};
use scenedeck::SceneManager;

fn describe(event: &BoxedEvent) -> String {
    if let Some(e) = downcast_event::<CurrentSlideChangedEvent>(event) {
        let old = e.old_slide.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        format!("slide     deck={} {} -> {}", e.deck, old, e.new_slide)
    } else if let Some(e) = downcast_event::<ObjectVisibilityChangedEvent>(event) {
        format!("visible   {} = {}", e.object, e.visible)
    } else if let Some(e) = downcast_event::<PropertyChangedEvent>(event) {
        format!("property  {}:{} = {:?}", e.object, e.property, e.value)
    } else if let Some(e) = downcast_event::<SlidePlayerStateChangedEvent>(event) {
        format!("player    deck={} {:?}", e.deck, e.state)
    } else if let Some(e) = downcast_event::<SlidePlayerPositionChangedEvent>(event) {
        format!("position  deck={} {:.1}ms", e.deck, e.position)
    } else if let Some(e) = downcast_event::<SlideContentChangedEvent>(event) {
        format!("content   slide={}", e.slide)
    } else if let Some(e) = downcast_event::<NodeAddedEvent>(event) {
        format!("added     {}", e.object)
    } else if let Some(e) = downcast_event::<NodeRemovedEvent>(event) {
        format!("removed   {}", e.object)
    } else {
        (**event).type_name().to_string()
    }
}

/// Drain the bus queue, printing if asked.
fn pump(presentation: &Presentation, print: bool, clock: f64) {
    for event in presentation.bus.poll() {
        if print {
            println!("[{:>9.1}] {}", clock, describe(&event));
        }
    }
}

fn summarize(p: &Presentation, manager: &SceneManager) -> Value {
    let name_of = |id| p.graph.get(id).map(|o| o.name.clone());
    let decks: Vec<Value> = manager
        .decks()
        .map(|(master, rt)| {
            let slide = rt.deck().current_slide(&p.graph);
            json!({
                "deck": master.to_string(),
                "owner": name_of(rt.owner()),
                "slide_index": rt.deck().current_index(),
                "slide": slide.and_then(name_of),
                "player": rt.player(),
            })
        })
        .collect();
    let visible: Vec<String> = manager
        .visible_objects()
        .iter()
        .filter_map(|id| p.graph.get(*id))
        .map(|o| o.id.clone())
        .collect();
    json!({
        "presentation": p.name,
        "decks": decks,
        "visible": visible,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let paths = args.path_config();
    cli::init_logger(&args, &paths)?;

    info!("SceneDeck {} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let mut config = RuntimeConfig::discover(args.config.as_deref(), &paths)?;
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    debug!("Runtime config: {:?}", config);

    let doc = PresentationDoc::load(&args.file)?;
    let mut presentation = doc.build(&config)?;
    info!(
        "Loaded '{}' ({} objects) from {}",
        presentation.name,
        presentation.graph.len(),
        args.file.display()
    );

    let mut manager = SceneManager::new(config.clone());
    manager.start(&mut presentation);
    let root = presentation.root();

    if let Some(slide) = &args.slide {
        let target = slide
            .parse::<usize>()
            .map(SlideRef::Index)
            .unwrap_or_else(|_| SlideRef::Name(slide.clone()));
        if !manager.set_slide_ref(&mut presentation, root, &target) {
            bail!("Slide '{}' not found in the top-level deck", slide);
        }
    }
    if args.autoplay {
        manager.play(&mut presentation, root);
    } else if args.no_autoplay {
        manager.stop(&mut presentation, root);
    }
    pump(&presentation, args.events, 0.0);

    let step = config.frame_interval_ms();
    let total = args.duration.max(0.0) * 1000.0;
    let mut clock = 0.0;
    while clock < total {
        let dt = step.min(total - clock);
        manager.tick(&mut presentation, dt);
        clock += dt;
        pump(&presentation, args.events, clock);
    }
    info!("Simulated {:.1}ms in {:.3}ms steps", clock, step);

    println!("{}", serde_json::to_string_pretty(&summarize(&presentation, &manager))?);
    Ok(())
}
