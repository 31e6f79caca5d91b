//! mDNS service advertisement adapter.
//!
//! Advertises `<hostname>.local` and a `_prometheus-http._tcp` service on
//! the metrics port with the TXT record `path=/`, so scrapers using DNS-SD
//! discovery find the endpoint without configuration. The responder is
//! re-announced every `announce_interval` from the service loop via
//! [`MdnsAdapter::tick`].
//!
//! Uses the ESP-IDF mDNS component on device and only logs in simulation.

use heapless::String as HString;
use log::{debug, info};

use crate::config::NodeConfig;
use crate::error::NetworkError;

const SERVICE_PROTO: &str = "_tcp";
/// TXT record telling scrapers where the metrics live.
pub const TXT_KEY: &str = "path";
pub const TXT_VALUE: &str = "/";

pub struct MdnsAdapter {
    hostname: HString<24>,
    instance: HString<32>,
    service_type: HString<32>,
    port: u16,
    interval_ms: u64,
    next_announce_ms: u64,
    announcements: u32,
    active: bool,
}

impl MdnsAdapter {
    pub fn new(config: &NodeConfig) -> Result<Self, NetworkError> {
        let copy = |s: &str| -> Result<HString<32>, NetworkError> {
            let mut out = HString::new();
            out.push_str(s).map_err(|()| NetworkError::Mdns)?;
            Ok(out)
        };
        let mut hostname = HString::new();
        hostname
            .push_str(&config.hostname)
            .map_err(|()| NetworkError::Mdns)?;

        Ok(Self {
            hostname,
            instance: copy(&config.service_instance)?,
            service_type: copy(&config.service_type)?,
            port: config.tcp_port,
            interval_ms: u64::from(config.announce_interval_secs) * 1000,
            next_announce_ms: 0,
            announcements: 0,
            active: false,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Times the responder has been (re-)announced.
    pub fn announcements(&self) -> u32 {
        self.announcements
    }

    /// Register hostname, service and TXT record.
    ///
    /// Call once the station has an address.
    pub fn start(&mut self, now_ms: u64) -> Result<(), NetworkError> {
        if self.active {
            return Ok(());
        }
        self.platform_start()?;
        self.active = true;
        self.announcements = 1;
        self.next_announce_ms = now_ms + self.interval_ms;
        info!(
            "mDNS: advertising {}.local {}.{}:{} ({}={})",
            self.hostname, self.service_type, SERVICE_PROTO, self.port, TXT_KEY, TXT_VALUE
        );
        Ok(())
    }

    /// Re-announce if the interval has elapsed. Returns whether it did.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if !self.active || now_ms < self.next_announce_ms {
            return false;
        }
        self.platform_announce();
        self.announcements = self.announcements.wrapping_add(1);
        self.next_announce_ms = now_ms + self.interval_ms;
        debug!("mDNS: announce #{}", self.announcements);
        true
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&self) -> Result<(), NetworkError> {
        use esp_idf_svc::sys::{
            ESP_OK, mdns_hostname_set, mdns_init, mdns_instance_name_set, mdns_service_add,
            mdns_service_txt_item_set,
        };
        use std::ffi::CString;

        let c = |s: &str| CString::new(s).map_err(|_| NetworkError::Mdns);
        let hostname = c(&self.hostname)?;
        let instance = c(&self.instance)?;
        let svc_type = c(&self.service_type)?;
        let svc_proto = c(SERVICE_PROTO)?;
        let txt_key = c(TXT_KEY)?;
        let txt_value = c(TXT_VALUE)?;

        unsafe {
            if mdns_init() != ESP_OK as i32 {
                return Err(NetworkError::Mdns);
            }
            if mdns_hostname_set(hostname.as_ptr()) != ESP_OK as i32 {
                return Err(NetworkError::Mdns);
            }
            mdns_instance_name_set(instance.as_ptr());
            if mdns_service_add(
                instance.as_ptr(),
                svc_type.as_ptr(),
                svc_proto.as_ptr(),
                self.port,
                core::ptr::null_mut(),
                0,
            ) != ESP_OK as i32
            {
                return Err(NetworkError::Mdns);
            }
            if mdns_service_txt_item_set(
                svc_type.as_ptr(),
                svc_proto.as_ptr(),
                txt_key.as_ptr(),
                txt_value.as_ptr(),
            ) != ESP_OK as i32
            {
                return Err(NetworkError::ServiceTxt);
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self) -> Result<(), NetworkError> {
        info!(
            "mDNS(sim): registered {}.local instance '{}'",
            self.hostname, self.instance
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_announce(&self) {
        use esp_idf_svc::sys::mdns_hostname_set;
        // Setting the hostname again makes the responder announce.
        if let Ok(hostname) = std::ffi::CString::new(self.hostname.as_str()) {
            unsafe {
                mdns_hostname_set(hostname.as_ptr());
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_announce(&self) {
        debug!("mDNS(sim): announce {}.local", self.hostname);
    }
}
