//! Full stack over a real loopback socket: simulated sensor on the bus,
//! `std::net` adapter, HTTP client on another thread.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use sensornode::adapters::tcp::TcpAcceptor;
use sensornode::app::NodeService;
use sensornode::app::ports::SensorPort;
use sensornode::config::NodeConfig;
use sensornode::drivers::sim_bus::{SimCommandBus, SimDelay, SimRegisterBus};
use sensornode::sensors::{self, SensorModel, bme688, crc, sht};

fn loopback() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
}

fn scrape(addr: SocketAddr) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: node\r\n\r\n")
            .unwrap();
        let mut body = String::new();
        client.read_to_string(&mut body).unwrap();
        body
    })
}

fn serve_one<S: SensorPort>(svc: &mut NodeService<TcpAcceptor, S>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while svc.served() == 0 {
        svc.poll_once().unwrap();
        assert!(Instant::now() < deadline, "no response served");
        thread::sleep(Duration::from_millis(1));
    }
}

fn sht4x_bus() -> SimCommandBus {
    let word = |w: u16| crc::encode_word(w);
    let mut reading = word(0x6666).to_vec();
    reading.extend_from_slice(&word(0x6666));
    let mut serial = word(0x1234).to_vec();
    serial.extend_from_slice(&word(0xABCD));

    let mut bus = SimCommandBus::new(sht::ADDRESS);
    bus.respond(&[0xFD], &reading);
    bus.respond(&[0x89], &serial);
    bus
}

#[test]
fn sht4x_node_serves_openmetrics() {
    let config = NodeConfig::default();
    let mut sensor = sensors::build(SensorModel::Sht4x, sht4x_bus(), SimDelay::new(), &config);
    sensor.initialize().unwrap();

    let acceptor = TcpAcceptor::bind(loopback(), 32).unwrap();
    let addr = acceptor.local_addr().unwrap();
    let mut svc = NodeService::new(acceptor, sensor);

    let client = scrape(addr);
    serve_one(&mut svc);
    let body = client.join().unwrap();

    assert_eq!(
        body,
        "HTTP/1.1 200 OK\r\n\
Content-Type: application/openmetrics-text; version=1.0.0; charset=utf-8\r\n\
\r\n\
# TYPE temp gauge\n\
temp 25.000000\n\
# TYPE humid gauge\n\
humid 44.000000\n\
# EOF\n"
    );
}

#[test]
fn bme688_node_serves_three_gauges() {
    let mut bus = SimRegisterBus::new(bme688::ADDRESS);
    bus.load(bme688::REG_CHIP_ID, &[bme688::CHIP_ID]);
    bus.load(
        bme688::REG_COEFF1,
        &[
            0xBF, 0x66, 0x03, 0x00, 0xF5, 0x90, 0x17, 0xD7, 0x58, 0x00, 0x7D, 0x1A, 0x7B, 0xFF,
            0x2A, 0x1E, 0x00, 0x00, 0xB0, 0xF3, 0x81, 0xF6, 0x1E,
        ],
    );
    bus.load(
        bme688::REG_COEFF2,
        &[0x41, 0x0B, 0x2F, 0x00, 0x2D, 0x14, 0x78, 0x9C, 0x21, 0x65],
    );
    bus.load(
        bme688::REG_MEAS_STATUS,
        &[0x80, 0x00, 0x55, 0x73, 0x00, 0x7A, 0x12, 0x00, 0x4E, 0x20],
    );

    let config = NodeConfig {
        sensor: SensorModel::Bme688,
        ..NodeConfig::default()
    };
    let mut sensor = sensors::build(config.sensor, bus, SimDelay::new(), &config);
    sensor.initialize().unwrap();

    let acceptor = TcpAcceptor::bind(loopback(), config.send_buffer_bytes).unwrap();
    let addr = acceptor.local_addr().unwrap();
    let mut svc = NodeService::new(acceptor, sensor);

    let client = scrape(addr);
    serve_one(&mut svc);
    let body = client.join().unwrap();

    let metrics = body.split("\r\n\r\n").nth(1).unwrap();
    assert_eq!(
        metrics,
        "# TYPE temp gauge\ntemp 26.899611\n\
# TYPE pressure gauge\npressure 99569.224817\n\
# TYPE humid gauge\nhumid 40.453917\n\
# EOF\n"
    );
}

#[test]
fn client_reset_mid_response_is_survivable() {
    let config = NodeConfig::default();
    let mut sensor = sensors::build(SensorModel::Sht4x, sht4x_bus(), SimDelay::new(), &config);
    sensor.initialize().unwrap();

    let acceptor = TcpAcceptor::bind(loopback(), 16).unwrap();
    let addr = acceptor.local_addr().unwrap();
    let mut svc = NodeService::new(acceptor, sensor);

    let mut impatient = TcpStream::connect(addr).unwrap();
    impatient
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    while !svc.is_busy() {
        svc.poll_once().unwrap();
        assert!(Instant::now() < deadline, "connection never accepted");
        thread::sleep(Duration::from_millis(1));
    }
    let mut head = [0u8; 4];
    impatient.read_exact(&mut head).unwrap();
    assert_eq!(&head, b"HTTP");
    // Closing with unread response bytes resets the connection.
    drop(impatient);
    thread::sleep(Duration::from_millis(50));

    while svc.is_busy() {
        svc.poll_once().unwrap();
        assert!(Instant::now() < deadline, "reset never noticed");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(svc.served(), 0);
    assert_eq!(svc.dropped(), 1);

    let client = scrape(addr);
    serve_one(&mut svc);
    let body = client.join().unwrap();
    assert!(body.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(body.ends_with("# EOF\n"));
}
