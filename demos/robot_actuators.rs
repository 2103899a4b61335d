//! Home the servos, sweep each through its range, and animate every LED group.
//!
//! ```text
//! RUST_LOG=debug demo_robot_actuators robot.toml
//! ```

use embassy_executor::Spawner;
use embassy_time::Timer;
use robot_actuators::Result;
use robot_actuators::command::{Command, Dispatcher, LedCommand, ServoCommand};
use robot_actuators::config::RobotConfig;
use robot_actuators::led_player::{self, LedPlayer, LedPlayerStatic};
use robot_actuators::linux::{self, LinuxLedStrip};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LED_GROUPS_MAX: usize = 4;

static LED_PLAYER_STATICS: [LedPlayerStatic; LED_GROUPS_MAX] =
    [const { LedPlayer::new_static() }; LED_GROUPS_MAX];

#[embassy_executor::task(pool_size = LED_GROUPS_MAX)]
async fn led_task(led_player_static: &'static LedPlayerStatic, led_strip: LinuxLedStrip) -> ! {
    led_player::device_loop(led_player_static, led_strip).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "robot_actuators=info,demo_robot_actuators=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = inner_main(spawner).await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn inner_main(spawner: Spawner) -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "robot.toml".to_owned());
    let config = RobotConfig::from_path(&path)?;
    info!("loaded {path}");

    let servos = linux::open_servos(&config)?;
    let mut dispatcher = Dispatcher::new(&servos);
    let mut groups = Vec::new();

    for (slot, (group, strip_config)) in config.strips().enumerate() {
        let Some(led_player_static) = LED_PLAYER_STATICS.get(slot) else {
            warn!("only {LED_GROUPS_MAX} LED groups are driven; skipping {group:?}");
            continue;
        };
        let led_strip = linux::open_strip(strip_config)?;
        spawner.spawn(led_task(led_player_static, led_strip))?;
        dispatcher = dispatcher.with_led_group(group, LedPlayer::new(led_player_static));
        groups.push((group.to_owned(), strip_config.demo()));
    }

    dispatcher.dispatch(Command::Servo(ServoCommand::HomeAll)).await?;
    for (group, demo) in &groups {
        dispatcher.dispatch(led(group, LedCommand::Start { demo: *demo })).await?;
    }

    for spec in servos.calibration() {
        for degrees in [spec.min_angle(), spec.max_angle(), spec.default_angle()] {
            let command = ServoCommand::MoveToAngle {
                name: spec.name().to_owned(),
                degrees,
            };
            dispatcher.dispatch(Command::Servo(command)).await?;
            Timer::after_millis(400).await;
        }
    }

    for (group, _) in &groups {
        dispatcher.dispatch(led(group, LedCommand::Pause)).await?;
    }
    Timer::after_secs(1).await;
    for (group, _) in &groups {
        dispatcher.dispatch(led(group, LedCommand::Resume)).await?;
    }
    Timer::after_secs(5).await;

    for (group, _) in &groups {
        dispatcher.dispatch(led(group, LedCommand::Stop)).await?;
    }
    for spec in servos.calibration() {
        let command = ServoCommand::Relax {
            name: spec.name().to_owned(),
        };
        dispatcher.dispatch(Command::Servo(command)).await?;
    }
    info!("done");
    Ok(())
}

fn led(group: &str, command: LedCommand) -> Command {
    Command::Led {
        group: group.to_owned(),
        command,
    }
}
