use async_trait::async_trait;
use serialport::SerialPortType;
use tokio_serial::{DataBits, FlowControl, Parity, SerialStream, StopBits};

use super::link::{LinkConnector, LinkIo};
use super::protocol::BAUD_RATE;
use super::{Result, SerialError, SerialPortInfo};

/// Thin wrapper over the host's serial ports.
pub struct SerialInterface;

impl SerialInterface {
    /// List every serial port the host exposes, with USB metadata where known.
    pub fn discover_ports() -> Result<Vec<SerialPortInfo>> {
        let ports = serialport::available_ports()?;
        let mut found = Vec::with_capacity(ports.len());

        for port in ports {
            let info = match port.port_type {
                SerialPortType::UsbPort(usb_info) => SerialPortInfo {
                    port_name: port.port_name,
                    kind: "usb".to_string(),
                    vid: Some(usb_info.vid),
                    pid: Some(usb_info.pid),
                    serial_number: usb_info.serial_number,
                    manufacturer: usb_info.manufacturer,
                    product: usb_info.product,
                },
                other => SerialPortInfo {
                    port_name: port.port_name,
                    kind: match other {
                        SerialPortType::PciPort => "pci",
                        SerialPortType::BluetoothPort => "bluetooth",
                        _ => "unknown",
                    }
                    .to_string(),
                    vid: None,
                    pid: None,
                    serial_number: None,
                    manufacturer: None,
                    product: None,
                },
            };
            found.push(info);
        }

        Ok(found)
    }

    /// Open a port in the rig's line settings (8N1, no flow control).
    pub fn open(port_name: &str, baud_rate: u32) -> Result<SerialStream> {
        let builder = tokio_serial::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None);

        let stream = SerialStream::open(&builder).map_err(|e| match e.kind() {
            serialport::ErrorKind::NoDevice => SerialError::PortNotFound(port_name.to_string()),
            _ => SerialError::ConnectionFailed(format!("{}: {}", port_name, e)),
        })?;

        log::info!("Opened serial port {} at {} baud", port_name, baud_rate);
        Ok(stream)
    }
}

/// Connects the hardware link to a physical serial port.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port_name: String,
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: BAUD_RATE,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

#[async_trait]
impl LinkConnector for SerialConnector {
    async fn connect(&self) -> Result<LinkIo> {
        let stream = SerialInterface::open(&self.port_name, self.baud_rate)?;
        Ok(LinkIo::from_stream(stream))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}
