//! Launchpad device driver
//!
//! Handles MIDI communication with the pad surface: port discovery,
//! connections, the inbound event channel and LED writes.

use anyhow::{Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::codec::{self, Brightness, PadAddress, Region};
use crate::midi::{format_hex, MidiMessage};

/// Inbound MIDI event from the surface
#[derive(Debug, Clone)]
pub struct PadEvent {
    pub timestamp: Instant,
    pub message: MidiMessage,
    pub raw: Vec<u8>,
}

/// Driver for hardware communication
pub struct LaunchpadDriver {
    /// MIDI input connection
    input_conn: Option<MidiInputConnection<()>>,

    /// MIDI output connection
    output_conn: Option<Arc<Mutex<MidiOutputConnection>>>,

    /// Event sender for incoming MIDI
    event_tx: mpsc::Sender<PadEvent>,

    /// Event receiver, handed to the dispatch loop
    event_rx: Option<mpsc::Receiver<PadEvent>>,

    /// Input port name pattern
    input_port_name: String,

    /// Output port name pattern
    output_port_name: String,
}

impl LaunchpadDriver {
    /// Create a new driver for the given port name patterns
    pub fn new(input_port: &str, output_port: &str) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);

        Self {
            input_conn: None,
            output_conn: None,
            event_tx,
            event_rx: Some(event_rx),
            input_port_name: input_port.to_string(),
            output_port_name: output_port.to_string(),
        }
    }

    /// Find an input port by case-insensitive substring match
    fn find_input_port(
        midi_in: &MidiInput,
        pattern: &str,
    ) -> Option<(midir::MidiInputPort, String)> {
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                if name.to_lowercase().contains(&pattern.to_lowercase()) {
                    debug!("Found port '{}' matching pattern '{}'", name, pattern);
                    return Some((port, name));
                }
            }
        }
        None
    }

    /// Find an output port by case-insensitive substring match
    fn find_output_port(
        midi_out: &MidiOutput,
        pattern: &str,
    ) -> Option<(midir::MidiOutputPort, String)> {
        for port in midi_out.ports() {
            if let Ok(name) = midi_out.port_name(&port) {
                if name.to_lowercase().contains(&pattern.to_lowercase()) {
                    debug!("Found port '{}' matching pattern '{}'", name, pattern);
                    return Some((port, name));
                }
            }
        }
        None
    }

    /// Connect to the device's MIDI ports
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        info!(
            "Connecting to Launchpad - Input: '{}', Output: '{}'",
            self.input_port_name, self.output_port_name
        );

        let midi_in = MidiInput::new("launchpad-gw-input").context("Failed to create MIDI input")?;

        let (in_port, port_name) = Self::find_input_port(&midi_in, &self.input_port_name)
            .ok_or_else(|| anyhow::anyhow!("Input port '{}' not found", self.input_port_name))?;

        info!("Connecting to input port: {}", port_name);

        // The input callback runs on midir's own thread; it forwards parsed
        // messages into the event channel without blocking.
        let event_tx = self.event_tx.clone();

        let input_conn = midi_in
            .connect(
                &in_port,
                "launchpad-gw",
                move |_timestamp, data, _| {
                    if let Some(message) = MidiMessage::parse(data) {
                        let event = PadEvent {
                            timestamp: Instant::now(),
                            message,
                            raw: data.to_vec(),
                        };
                        let _ = event_tx.try_send(event);
                    } else {
                        debug!("Dropped unparsed MIDI: {}", format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!("Failed to connect to input port: {e}"))?;

        self.input_conn = Some(input_conn);

        let midi_out =
            MidiOutput::new("launchpad-gw-output").context("Failed to create MIDI output")?;

        let (out_port, port_name) = Self::find_output_port(&midi_out, &self.output_port_name)
            .ok_or_else(|| anyhow::anyhow!("Output port '{}' not found", self.output_port_name))?;

        info!("Connecting to output port: {}", port_name);

        let output_conn = midi_out
            .connect(&out_port, "launchpad-gw")
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port: {e}"))?;

        self.output_conn = Some(Arc::new(Mutex::new(output_conn)));

        info!("Launchpad connected successfully");
        Ok(())
    }

    /// Disconnect from MIDI ports
    pub fn disconnect(&mut self) {
        if self.input_conn.is_some() || self.output_conn.is_some() {
            info!("Launchpad disconnected");
        }
        self.input_conn = None;
        self.output_conn = None;
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.input_conn.is_some() && self.output_conn.is_some()
    }

    /// Send a MIDI message to the device
    pub fn send(&self, message: &MidiMessage) -> Result<()> {
        let data = message.encode();
        self.send_raw(&data)?;
        debug!("Sent: {} | {}", format_hex(&data), message);
        Ok(())
    }

    /// Send raw MIDI bytes to the device
    pub fn send_raw(&self, data: &[u8]) -> Result<()> {
        let output = self
            .output_conn
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Not connected to output port"))?;

        let mut conn = output.lock().unwrap();
        conn.send(data).context("Failed to send MIDI message")?;

        Ok(())
    }

    /// Set one pad's LED to the given green/red intensities.
    ///
    /// Fails with the codec's range error for an out-of-range index.
    pub fn set_led(&self, region: Region, index: u8, green: Brightness, red: Brightness) -> Result<()> {
        let addr = PadAddress::new(region, index)?;
        self.send(&codec::led_message(addr, green, red))
    }

    /// Set a grid LED by (row, col) coordinates
    pub fn set_grid_led(&self, row: u8, col: u8, green: Brightness, red: Brightness) -> Result<()> {
        let addr = PadAddress::grid_cell(row, col)?;
        self.send(&codec::led_message(addr, green, red))
    }

    /// Turn every LED on the surface off
    pub fn clear_all(&self) -> Result<()> {
        for region in [Region::CommandRow, Region::CommandColumn, Region::Grid] {
            for index in 0..region.pad_count() {
                self.set_led(region, index, Brightness::Off, Brightness::Off)?;
            }
        }
        Ok(())
    }

    /// Take the event receiver (for the dispatch loop to consume)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<PadEvent>> {
        self.event_rx.take()
    }
}

/// Port discovery utilities
pub mod discovery {
    use super::*;

    /// List available MIDI input port names
    pub fn input_port_names() -> Result<Vec<String>> {
        let midi_in = MidiInput::new("launchpad-gw-scanner")?;

        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    /// List available MIDI output port names
    pub fn output_port_names() -> Result<Vec<String>> {
        let midi_out = MidiOutput::new("launchpad-gw-scanner")?;

        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }

    /// Find Launchpad ports automatically by name pattern
    pub fn find_launchpad_ports() -> Option<(String, String)> {
        let patterns = ["Launchpad", "LPMini"];

        let inputs = input_port_names().ok()?;
        let outputs = output_port_names().ok()?;

        for pattern in patterns {
            let input = inputs.iter().find(|name| name.contains(pattern));
            let output = outputs.iter().find(|name| name.contains(pattern));

            if let (Some(input), Some(output)) = (input, output) {
                return Some((input.clone(), output.clone()));
            }
        }

        None
    }

    /// Print discovered ports for `--list-ports`
    pub fn print_ports() {
        use colored::*;

        println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

        println!("\n{}", "Input Ports:".bold());
        match input_port_names() {
            Ok(names) if names.is_empty() => println!("  {}", "No input ports found".dimmed()),
            Ok(names) => {
                for name in names {
                    println!("  {}", name);
                }
            }
            Err(e) => println!("  {}", format!("Error listing inputs: {}", e).red()),
        }

        println!("\n{}", "Output Ports:".bold());
        match output_port_names() {
            Ok(names) if names.is_empty() => println!("  {}", "No output ports found".dimmed()),
            Ok(names) => {
                for name in names {
                    println!("  {}", name);
                }
            }
            Err(e) => println!("  {}", format!("Error listing outputs: {}", e).red()),
        }

        if let Some((input, output)) = find_launchpad_ports() {
            println!("\n{}", "Auto-detected Launchpad:".bold().bright_green());
            println!("  Input:  {}", input.bright_white());
            println!("  Output: {}", output.bright_white());
        }
        println!();
    }
}
