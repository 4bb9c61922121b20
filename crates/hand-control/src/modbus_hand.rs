use crate::{HandController, HandError, MetricsHub, ModbusConfig, ModbusRegisterClient, Result};
use hand_protocol::{
    split_register_bytes, Generation, JointFeedback, JointVector, RegisterEntry, RegisterMap,
    RegisterName, TactileFrame, TactileFrameDecoder, TactileMatrix, TactileSite, JOINT_COUNT,
};
use hand_transport::RegisterBus;
use tracing::warn;

/// A hand driven over Modbus-TCP holding registers. The only transport with tactile access.
pub struct ModbusHand<B: RegisterBus> {
    config: ModbusConfig,
    map: RegisterMap,
    client: ModbusRegisterClient<B>,
    metrics: Option<MetricsHub>,
}

impl<B: RegisterBus> ModbusHand<B> {
    pub fn new(config: ModbusConfig, generation: Generation) -> Self {
        Self {
            config,
            map: RegisterMap::for_generation(generation),
            client: ModbusRegisterClient::new(),
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

    pub fn attach(&mut self, bus: B) {
        self.client.attach(bus);
    }

    fn entry(&self, name: RegisterName) -> Result<RegisterEntry> {
        Ok(self.map.resolve(name)?)
    }

    /// Read exactly `count` registers from `name`, failing on a short reply.
    fn read_exact(&mut self, name: RegisterName, count: usize) -> Result<Vec<u16>> {
        let entry = self.entry(name)?;
        let values = self.client.read_block(entry.address, count)?;
        if values.len() < count {
            warn!(register = %name, expected = count, actual = values.len(), "short register read");
            if let Some(hub) = &self.metrics {
                hub.hand.short_reads.inc();
            }
            return Err(HandError::ShortRead {
                expected: count,
                actual: values.len(),
            });
        }
        Ok(values)
    }

    /// Raw read of an arbitrary register, sized by its layout.
    pub fn read_register(&mut self, name: RegisterName) -> Result<Vec<u16>> {
        let count = self.entry(name)?.layout.register_count();
        self.read_exact(name, count)
    }

    pub fn write_register(&mut self, name: RegisterName, values: &[u16]) -> Result<()> {
        let entry = self.entry(name)?;
        self.client.write(entry.address, values)
    }

    fn tactile_decoder(&self) -> Result<TactileFrameDecoder> {
        if !self.map.generation().has_tactile() {
            return Err(HandError::UnsupportedCapability(
                "tactile sensing is only available on Gen4 hands",
            ));
        }
        Ok(TactileFrameDecoder::new(&self.map)?)
    }
}

impl<B: RegisterBus> HandController for ModbusHand<B> {
    fn generation(&self) -> Generation {
        self.map.generation()
    }

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    fn connect(&mut self) -> Result<()> {
        let endpoint = self.config.endpoint();
        self.client
            .connect(&endpoint, self.config.unit_id, self.config.timeout())
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn disconnect(&mut self) -> Result<()> {
        self.client.disconnect()
    }

    fn accepts_unchanged(&self) -> bool {
        true
    }

    fn write_scalar(&mut self, name: RegisterName, value: u16) -> Result<()> {
        self.write_register(name, &[value])
    }

    fn write_joints(&mut self, name: RegisterName, values: &JointVector) -> Result<()> {
        self.write_register(name, &values.to_words())
    }

    fn read_scalar(&mut self, name: RegisterName) -> Result<u16> {
        Ok(self.read_exact(name, 1)?[0])
    }

    fn read_joint_words(&mut self, name: RegisterName) -> Result<JointFeedback> {
        let values = self.read_exact(name, JOINT_COUNT)?;
        let mut out = [0u16; JOINT_COUNT];
        out.copy_from_slice(&values[..JOINT_COUNT]);
        Ok(JointFeedback(out))
    }

    fn read_joint_bytes(&mut self, name: RegisterName) -> Result<[u8; JOINT_COUNT]> {
        let values = self.read_exact(name, JOINT_COUNT / 2)?;
        let bytes = split_register_bytes(&values[..JOINT_COUNT / 2]);
        let mut out = [0u8; JOINT_COUNT];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    fn get_tactile_frame(&mut self) -> Result<TactileFrame> {
        let decoder = self.tactile_decoder()?;
        if !self.client.is_connected() {
            return Err(HandError::NotConnected);
        }
        let frame = decoder.decode_frame(&mut self.client);
        if let Some(hub) = &self.metrics {
            hub.hand.tactile_faults.inc_by(frame.faults.len() as u64);
        }
        Ok(frame)
    }

    fn get_tactile_site(&mut self, site: TactileSite) -> Result<TactileMatrix> {
        let decoder = self.tactile_decoder()?;
        decoder.decode_site(&mut self.client, site)
    }
}
