//! Headless co-op peer
//!
//! Connects to a relay, takes whatever role it is given and plays a simple
//! bot: strafe in a circle, shoot the nearest enemy in range. Useful for
//! soak-testing host migration without a browser.

use std::str::FromStr;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use horde_coop_server::config::ClientConfig;
use horde_coop_server::game::constants::net::SCHEDULER_TICK_RATE;
use horde_coop_server::game::ports::{EntityId, EntityKind, Hit, HudSink, Intent, RenderSink};
use horde_coop_server::game::progression::ShopItem;
use horde_coop_server::game::weapons::WeaponKind;
use horde_coop_server::game::Session;
use horde_coop_server::net::client::RelayClient;
use horde_coop_server::net::protocol::Transform;
use horde_coop_server::util::vec2::Vec2;

/// Bot engagement range
const ENGAGE_RANGE: f32 = 40.0;
/// Seconds per full strafe circle
const STRAFE_PERIOD: f32 = 12.0;

struct LogRender;

impl RenderSink for LogRender {
    fn add_entity(&mut self, id: EntityId, kind: EntityKind, _transform: Transform) {
        debug!("render add {:?} as {:?}", id, kind);
    }

    fn remove_entity(&mut self, id: EntityId) {
        debug!("render remove {:?}", id);
    }

    fn update_transform(&mut self, _id: EntityId, _transform: Transform) {}
}

struct LogHud;

impl HudSink for LogHud {
    fn on_kill_count_changed(&mut self, kill_count: u32) {
        info!("Room kills: {}", kill_count);
    }

    fn on_boss_alert(&mut self, text: &str) {
        warn!("{}", text);
    }

    fn on_hit_marker(&mut self, _headshot: bool) {}

    fn on_level_up(&mut self, level: u32) {
        info!("Level up: {}", level);
    }

    fn on_weapon_drop(&mut self, weapon: WeaponKind) {
        info!("Picked up {:?}", weapon);
    }

    fn on_store_opened(&mut self) {
        info!("Store opened");
    }
}

/// Comma-separated shop items from `AUTO_BUY`, bought in order as coins allow
fn auto_buy_list() -> Vec<ShopItem> {
    let Ok(raw) = std::env::var("AUTO_BUY") else {
        return Vec::new();
    };
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match ShopItem::from_str(s) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Ignoring AUTO_BUY entry: {}", e);
                None
            }
        })
        .collect()
}

fn bot_intents(session: &Session, elapsed: f32) -> Vec<Intent> {
    let angle = elapsed / STRAFE_PERIOD * std::f32::consts::TAU;
    let dir = Vec2::from_angle(angle);
    let mut intents = vec![Intent::Move { dx: dir.x, dz: dir.z }];

    let position = session.position();
    let nearest = session
        .mirror()
        .projections()
        .iter()
        .filter(|p| p.alive)
        .map(|p| (p, position.distance_to(Vec2::new(p.x, p.z))))
        .filter(|(_, d)| *d <= ENGAGE_RANGE)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((target, _)) = nearest {
        if let Some(yaw) = position.yaw_towards(Vec2::new(target.x, target.z)) {
            intents.push(Intent::Aim { yaw });
        }
        intents.push(Intent::Fire {
            hit: Some(Hit::Enemy {
                id: target.id,
                headshot: false,
            }),
        });
    }
    intents
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ClientConfig::load_or_default();
    config.validate()?;
    info!("Headless peer connecting to {}", config.relay_url);

    let client = RelayClient::spawn(config)?;
    let mut events = client.subscribe();

    let seed = rand::random::<u64>();
    let mut session = Session::new(Box::new(LogRender), Box::new(LogHud), seed);
    session.start();

    let mut shopping = auto_buy_list().into_iter().peekable();
    let dt = 1.0 / SCHEDULER_TICK_RATE as f32;
    let mut ticker = tokio::time::interval(Duration::from_secs_f32(dt));
    let mut elapsed = 0.0f32;
    let mut last_role = session.role();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                elapsed += dt;
                for intent in bot_intents(&session, elapsed) {
                    session.intent(intent);
                }
                session.update(dt);

                if let Some(item) = shopping.peek().copied() {
                    if session.ledger().coins >= item.price() {
                        match session.buy(item) {
                            Ok(()) => info!("Bought {:?}", item),
                            Err(e) => warn!("Could not buy {:?}: {}", item, e),
                        }
                        shopping.next();
                    }
                }

                for msg in session.take_outbox() {
                    if let Err(e) = client.publish(msg) {
                        error!("Transport gone: {}", e);
                        return Ok(());
                    }
                }

                if session.role() != last_role {
                    last_role = session.role();
                    match session.host_id() {
                        Some(host) => info!("Role: {:?} (host {})", last_role, host),
                        None => info!("Role: {:?}", last_role),
                    }
                }
            }
            event = events.recv() => match event {
                Ok(event) => session.on_client_event(event),
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} relay events", skipped),
                Err(RecvError::Closed) => {
                    error!("Transport adapter stopped");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    client.shutdown();
    Ok(())
}
