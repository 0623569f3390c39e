//! Serial ports provided by the operating system
//!
//! Thin wrapper over the `serialport` crate implementing [`PortProvider`] and
//! [`SerialLink`].

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};

use super::link::{PortInfo, PortProvider, SerialLink};
use crate::error::{Result, ScopeError};

/// Enumerates and opens real serial devices
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl SystemPorts {
    pub fn new() -> Self {
        Self
    }
}

impl PortProvider for SystemPorts {
    fn available_ports(&self) -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports()
            .map_err(|e| ScopeError::Link(format!("Failed to enumerate ports: {}", e)))?;

        Ok(ports
            .into_iter()
            .map(|p| port_info(p.port_name, &p.port_type))
            .collect())
    }

    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialLink>> {
        let handle = serialport::new(port, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| ScopeError::Open {
                port: port.to_string(),
                message: e.to_string(),
            })?;

        Ok(Box::new(SystemLink {
            name: port.to_string(),
            port: Some(handle),
        }))
    }
}

fn port_info(device: String, port_type: &SerialPortType) -> PortInfo {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let description = usb
                .product
                .clone()
                .or_else(|| usb.manufacturer.clone())
                .unwrap_or_else(|| "USB Serial".to_string());
            let mut hwid = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
            if let Some(serial) = &usb.serial_number {
                hwid.push_str(&format!(" SER={}", serial));
            }
            PortInfo::new(device, description, hwid)
        }
        SerialPortType::PciPort => PortInfo::new(device, "PCI serial", "PCI"),
        SerialPortType::BluetoothPort => PortInfo::new(device, "Bluetooth serial", "BLUETOOTH"),
        SerialPortType::Unknown => {
            let description = device.clone();
            PortInfo::new(device, description, "n/a")
        }
    }
}

/// An open OS serial port
pub struct SystemLink {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SystemLink {
    fn handle(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(ScopeError::NotConnected)
    }
}

/// Timeouts and interrupts are transient; anything else means the device is gone
fn classify_io(err: io::Error) -> ScopeError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => {
            ScopeError::Io(err)
        }
        _ => ScopeError::Link(err.to_string()),
    }
}

impl SerialLink for SystemLink {
    fn bytes_available(&mut self) -> Result<usize> {
        let count = self
            .handle()?
            .bytes_to_read()
            .map_err(|e| ScopeError::Link(e.to_string()))?;
        Ok(count as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.handle()?.read(buf).map_err(classify_io)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.handle()?;
        let written = port.write(data).map_err(classify_io)?;
        port.flush().map_err(classify_io)?;
        Ok(written)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        // Dropping the handle closes the descriptor
        self.port = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}
