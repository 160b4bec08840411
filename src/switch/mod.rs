//! Smart-switch bridge (spec §4.13, §6, C-adapter layer), grounded on the
//! original implementation's `mqtt_client.py` + `geekopen_controller.py`
//! cloud-MQTT protocol: per-device status topic `/{prefix}/{uid}/{mac}/subscribe`
//! and command topic `/{prefix}/{uid}/{mac}/publish`, JSON payloads tagged
//! with a `type` marker and a full per-key 0/1 state vector.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SwitchDevice {
    pub mac: String,
    pub name: String,
    pub key_count: u8,
    pub prefix: String,
    pub uid: String,
}

impl SwitchDevice {
    fn mac_clean(&self) -> String {
        self.mac.to_lowercase().replace([':', '-'], "")
    }

    pub fn subscribe_topic(&self) -> String {
        format!("/{}/{}/{}/subscribe", self.prefix, self.uid, self.mac_clean())
    }

    pub fn publish_topic(&self) -> String {
        format!("/{}/{}/{}/publish", self.prefix, self.uid, self.mac_clean())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwitchState {
    pub keys: [bool; 4],
    pub last_update: Option<std::time::Instant>,
}

impl SwitchState {
    pub fn get(&self, key_index: u8) -> Option<bool> {
        self.keys.get((key_index - 1) as usize).copied()
    }
}

#[derive(Serialize)]
struct CommandPayload {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    keys: HashMap<String, u8>,
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(flatten)]
    keys: HashMap<String, serde_json::Value>,
}

pub struct SwitchBridge {
    client: AsyncClient,
    devices: Arc<Mutex<HashMap<String, SwitchDevice>>>, // name -> device
    states: Arc<Mutex<HashMap<String, SwitchState>>>,   // mac_clean -> state
    confirm: Arc<Notify>,
    confirm_wait: Duration,
}

impl SwitchBridge {
    /// Connects to the broker and starts the reader loop on a detached task
    /// (spec §5: "runs its own reader loop; status callbacks are delivered
    /// ... through a thread-safe state map").
    pub fn connect(client_id: &str, broker: &str, port: u16, confirm_wait: Duration) -> (Self, tokio::task::JoinHandle<()>) {
        let mut opts = MqttOptions::new(client_id, broker, port);
        opts.set_keep_alive(Duration::from_secs(60));

        let (client, mut eventloop) = AsyncClient::new(opts, 32);
        let states: Arc<Mutex<HashMap<String, SwitchState>>> = Arc::new(Mutex::new(HashMap::new()));
        let devices: Arc<Mutex<HashMap<String, SwitchDevice>>> = Arc::new(Mutex::new(HashMap::new()));
        let confirm = Arc::new(Notify::new());

        let states_task = states.clone();
        let devices_task = devices.clone();
        let confirm_task = confirm.clone();
        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        handle_status_message(&devices_task, &states_task, &p.topic, &p.payload);
                        confirm_task.notify_waiters();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("mqtt reader loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        (Self { client, devices, states, confirm, confirm_wait }, handle)
    }

    pub async fn register_device(&self, device: SwitchDevice) -> Result<(), crate::error::VoiceError> {
        let topic = device.subscribe_topic();
        self.client
            .subscribe(&topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| crate::error::VoiceError::Network(format!("mqtt subscribe: {e}")))?;
        let mac = device.mac_clean();
        self.states.lock().unwrap().insert(mac, SwitchState::default());
        self.devices.lock().unwrap().insert(device.name.clone(), device);
        Ok(())
    }

    /// Sends a command with a full per-key state vector and waits up to
    /// `confirm_wait` for a status echo (spec §4.13).
    pub async fn set_key(&self, name: &str, key_index: u8, on: bool) -> Result<bool, crate::error::VoiceError> {
        let device = {
            let devices = self.devices.lock().unwrap();
            devices
                .get(name)
                .cloned()
                .ok_or_else(|| crate::error::VoiceError::Network(format!("unknown switch device: {name}")))?
        };

        let mut keys = HashMap::new();
        for i in 1..=device.key_count {
            let value = if i == key_index { on as u8 } else {
                self.states
                    .lock()
                    .unwrap()
                    .get(&device.mac_clean())
                    .and_then(|s| s.get(i))
                    .map(|b| b as u8)
                    .unwrap_or(0)
            };
            keys.insert(format!("key{i}"), value);
        }
        let payload = CommandPayload { kind: "event", keys };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| crate::error::VoiceError::Network(format!("serialize command: {e}")))?;

        self.client
            .publish(device.publish_topic(), QoS::AtLeastOnce, false, body)
            .await
            .map_err(|e| crate::error::VoiceError::Network(format!("mqtt publish: {e}")))?;

        let deadline = tokio::time::Instant::now() + self.confirm_wait;
        loop {
            if self
                .states
                .lock()
                .unwrap()
                .get(&device.mac_clean())
                .and_then(|s| s.get(key_index))
                == Some(on)
            {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                warn!("switch {name} key{key_index}: no status echo within {:?}", self.confirm_wait);
                return Ok(true); // command sent; echo just didn't arrive in time
            }
            tokio::select! {
                _ = self.confirm.notified() => {}
                _ = tokio::time::sleep(remaining) => {}
            }
        }
    }

    pub fn get_state(&self, name: &str) -> Option<SwitchState> {
        let mac = self.devices.lock().unwrap().get(name)?.mac_clean();
        self.states.lock().unwrap().get(&mac).cloned()
    }
}

fn handle_status_message(
    devices: &Arc<Mutex<HashMap<String, SwitchDevice>>>,
    states: &Arc<Mutex<HashMap<String, SwitchState>>>,
    topic: &str,
    payload: &[u8],
) {
    let mac = devices
        .lock()
        .unwrap()
        .values()
        .find(|d| d.subscribe_topic() == topic)
        .map(|d| d.mac_clean());
    let Some(mac) = mac else {
        return;
    };
    let Ok(status) = serde_json::from_slice::<StatusPayload>(payload) else {
        warn!("switch status message on {topic} was not valid JSON");
        return;
    };

    let mut states = states.lock().unwrap();
    let state = states.entry(mac.clone()).or_default();
    for i in 1u8..=4 {
        if let Some(v) = status.keys.get(&format!("key{i}")) {
            if let Some(n) = v.as_i64() {
                state.keys[(i - 1) as usize] = n == 1;
            }
        }
    }
    state.last_update = Some(std::time::Instant::now());
    info!("switch {mac} state updated: {:?}", state.keys);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_shape_matches_protocol() {
        let d = SwitchDevice {
            mac: "D4:8A:FC:3A:F2:EA".to_string(),
            name: "客厅灯".to_string(),
            key_count: 2,
            prefix: "bKFSKE".to_string(),
            uid: "qNACgJaGGlTG".to_string(),
        };
        assert_eq!(d.subscribe_topic(), "/bKFSKE/qNACgJaGGlTG/d48afc3af2ea/subscribe");
        assert_eq!(d.publish_topic(), "/bKFSKE/qNACgJaGGlTG/d48afc3af2ea/publish");
    }

    #[test]
    fn status_payload_updates_requested_keys_only() {
        let devices = Arc::new(Mutex::new(HashMap::new()));
        let states = Arc::new(Mutex::new(HashMap::new()));
        let d = SwitchDevice {
            mac: "AA11".to_string(),
            name: "test".to_string(),
            key_count: 2,
            prefix: "p".to_string(),
            uid: "u".to_string(),
        };
        let topic = d.subscribe_topic();
        devices.lock().unwrap().insert(d.name.clone(), d);
        let payload = serde_json::json!({"key1": 1, "key2": 0}).to_string();
        handle_status_message(&devices, &states, &topic, payload.as_bytes());
        let st = states.lock().unwrap().get("aa11").cloned().unwrap();
        assert_eq!(st.get(1), Some(true));
        assert_eq!(st.get(2), Some(false));
    }
}
