use crate::{
    HandController, HandError, MetricsHub, Result, SerialConfig, SerialRegisterClient,
};
use hand_protocol::{
    pack_joint_words, unpack_joint_words, Generation, JointFeedback, JointVector, RegisterEntry,
    RegisterMap, RegisterName, JOINT_COUNT,
};
use hand_transport::{PortInfo, SerialLine};
use tracing::warn;

/// A hand driven over the `EB 90` serial protocol.
pub struct SerialHand<L: SerialLine> {
    config: SerialConfig,
    map: RegisterMap,
    client: SerialRegisterClient<L>,
    metrics: Option<MetricsHub>,
}

impl<L: SerialLine> SerialHand<L> {
    pub fn new(config: SerialConfig, generation: Generation) -> Self {
        let client = SerialRegisterClient::new(config.timing);
        Self {
            config,
            map: RegisterMap::for_generation(generation),
            client,
            metrics: None,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.client.set_debug(debug);
        self
    }

    pub fn with_metrics(mut self, hub: MetricsHub) -> Self {
        self.client.set_metrics(Some(hub.hand.clone()));
        self.metrics = Some(hub);
        self
    }

    pub fn metrics(&self) -> Option<&MetricsHub> {
        self.metrics.as_ref()
    }

    pub fn hand_id(&self) -> u8 {
        self.config.hand_id
    }

    pub fn set_hand_id(&mut self, hand_id: u8) {
        self.config.hand_id = hand_id;
    }

    pub fn list_ports() -> Result<Vec<PortInfo>> {
        Ok(L::list()?)
    }

    /// Use an already opened line instead of the configured port.
    pub fn attach(&mut self, line: L) {
        self.client.attach(line);
    }

    fn entry(&self, name: RegisterName) -> Result<RegisterEntry> {
        Ok(self.map.resolve(name)?)
    }

    /// Read exactly `len` bytes from `name`, failing on a short reply.
    fn read_bytes(&mut self, name: RegisterName, len: u8) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        let payload = self.client.read(self.config.hand_id, entry.address, len)?;
        if payload.data.len() < usize::from(len) {
            warn!(register = %name, expected = len, actual = payload.data.len(), "short register read");
            if let Some(hub) = &self.metrics {
                hub.hand.short_reads.inc();
            }
            return Err(HandError::ShortRead {
                expected: usize::from(len),
                actual: payload.data.len(),
            });
        }
        Ok(payload.data)
    }

    /// Raw read of an arbitrary register, sized by its layout.
    pub fn read_register(&mut self, name: RegisterName) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        let len = entry.layout.serial_len().ok_or(HandError::UnsupportedCapability(
            "tactile blocks are not readable over serial",
        ))?;
        self.read_bytes(name, len)
    }

    /// Raw write of `bytes` to an arbitrary register.
    pub fn write_register(&mut self, name: RegisterName, bytes: &[u8]) -> Result<()> {
        let entry = self.entry(name)?;
        self.client.write(self.config.hand_id, entry.address, bytes)
    }
}

impl<L: SerialLine> HandController for SerialHand<L> {
    fn generation(&self) -> Generation {
        self.map.generation()
    }

    fn endpoint(&self) -> String {
        format!("{}@{}", self.config.port, self.config.baudrate)
    }

    fn connect(&mut self) -> Result<()> {
        let port = self.config.port.clone();
        self.client.connect(&port, self.config.baudrate)
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn disconnect(&mut self) -> Result<()> {
        self.client.disconnect()
    }

    fn accepts_unchanged(&self) -> bool {
        false
    }

    fn write_scalar(&mut self, name: RegisterName, value: u16) -> Result<()> {
        let byte = u8::try_from(value).map_err(|_| {
            HandError::Validation(format!("{name} takes a single byte, got {value}"))
        })?;
        self.write_register(name, &[byte])
    }

    fn write_joints(&mut self, name: RegisterName, values: &JointVector) -> Result<()> {
        self.write_register(name, &pack_joint_words(values.to_words()))
    }

    fn read_scalar(&mut self, name: RegisterName) -> Result<u16> {
        let bytes = self.read_bytes(name, 1)?;
        Ok(u16::from(bytes[0]))
    }

    fn read_joint_words(&mut self, name: RegisterName) -> Result<JointFeedback> {
        let bytes = self.read_bytes(name, (JOINT_COUNT * 2) as u8)?;
        Ok(JointFeedback(unpack_joint_words(&bytes)?))
    }

    fn read_joint_bytes(&mut self, name: RegisterName) -> Result<[u8; JOINT_COUNT]> {
        let bytes = self.read_bytes(name, JOINT_COUNT as u8)?;
        let mut out = [0u8; JOINT_COUNT];
        out.copy_from_slice(&bytes[..JOINT_COUNT]);
        Ok(out)
    }
}
