//! SensorNode firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  I2cDriver ──▶ sensor driver      TcpAcceptor / Connection   │
//! │  WifiAdapter (Connectivity)       MdnsAdapter · UptimeClock  │
//! │  BlinkReporter (FatalReporter)                               │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ────────────────       │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  NodeService · Listener · ResponseSession · render     │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Board wiring: sensor SDA on GPIO8, SCL on GPIO9, status LED on GPIO2.
#![deny(unused_must_use)]

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use anyhow::{Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{info, warn};

use sensornode::adapters::mdns::MdnsAdapter;
use sensornode::adapters::tcp::TcpAcceptor;
use sensornode::adapters::time::UptimeClock;
use sensornode::adapters::wifi::WifiAdapter;
use sensornode::app::ports::FatalReporter;
use sensornode::app::{NodeService, connect_with_retry};
use sensornode::config::NodeConfig;
use sensornode::drivers::status_led::{BlinkReporter, IndicatorLed};
use sensornode::error::{Fault, NetworkError, TransportError};
use sensornode::sensors;

/// Unwrap `result` or hand the fault to the reporter (never returns).
fn or_report<T>(reporter: &mut impl FatalReporter, result: Result<T, Fault>) -> T {
    match result {
        Ok(v) => v,
        Err(fault) => reporter.report(fault),
    }
}

fn bring_up_wifi(modem: Modem, config: &NodeConfig) -> Result<WifiAdapter, Fault> {
    let init = |e: esp_idf_svc::sys::EspError| {
        warn!("WiFi init: {}", e);
        Fault::Network(NetworkError::Init)
    };
    let sysloop = EspSystemEventLoop::take().map_err(init)?;
    let nvs = EspDefaultNvsPartition::take().map_err(init)?;
    let wifi = BlockingWifi::wrap(
        EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(init)?,
        sysloop,
    )
    .map_err(init)?;

    WifiAdapter::new(wifi, &config.wlan_ssid, &config.wlan_password).map_err(|e| {
        warn!("WiFi credentials: {}", e);
        Fault::Network(NetworkError::Wlan)
    })
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("SensorNode v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load(option_env!("NODE_CONFIG")).context("node configuration")?;
    info!("Config: sensor={:?} port={}", config.sensor, config.tcp_port);

    let peripherals = Peripherals::take().context("peripherals")?;

    // ── 2. Status LED: lit while bringing the node up ─────────
    let led = IndicatorLed::new(PinDriver::output(peripherals.pins.gpio2).context("LED pin")?);
    let mut reporter = BlinkReporter::new(led, FreeRtos);
    reporter.led_mut().on();

    // ── 3. Sensor ─────────────────────────────────────────────
    let i2c_config = I2cConfig::new().baudrate(Hertz(config.i2c_frequency_hz));
    let i2c = match I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio9,
        &i2c_config,
    ) {
        Ok(i2c) => i2c,
        Err(e) => {
            warn!("I2C init: {}", e);
            reporter.report(TransportError::BusInit.into());
        }
    };
    let mut sensor = sensors::build(config.sensor, i2c, FreeRtos, &config);
    or_report(&mut reporter, sensor.initialize());

    // ── 4. Network ────────────────────────────────────────────
    let wifi = bring_up_wifi(peripherals.modem, &config);
    let mut wifi = or_report(&mut reporter, wifi);
    let wlan_code = Fault::Network(NetworkError::Wlan).code();
    let retry_delay_ms = config.wlan_retry_delay_ms;
    let associated = connect_with_retry(&mut wifi, |_| {
        reporter.flash(wlan_code);
        FreeRtos::delay_ms(retry_delay_ms);
    });
    or_report(&mut reporter, associated);

    let clock = UptimeClock::new();
    let mdns = MdnsAdapter::new(&config).map_err(Fault::from);
    let mut mdns = or_report(&mut reporter, mdns);
    let started = mdns.start(clock.uptime_ms()).map_err(Fault::from);
    or_report(&mut reporter, started);

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.tcp_port));
    let acceptor = TcpAcceptor::bind(addr, config.send_buffer_bytes).map_err(Fault::from);
    let acceptor = or_report(&mut reporter, acceptor);

    reporter.led_mut().off();
    info!("Serving metrics on {}", addr);

    // ── 5. Service loop ───────────────────────────────────────
    let mut service = NodeService::new(acceptor, sensor);
    loop {
        if let Err(fault) = service.poll_once() {
            reporter.report(fault);
        }
        mdns.tick(clock.uptime_ms());
        FreeRtos::delay_ms(config.loop_sleep_ms);
    }
}
