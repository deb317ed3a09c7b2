//! sdram.rs — UBIBoot SDRAM timing planner and memory controller
//!
//! Nanosecond timing characteristics are turned into DMCR cycle fields by
//! dividing through the memory clock period and clamping into each field's
//! range. A value that would not fit is programmed as the field maximum:
//! best effort, never an out-of-range write that bleeds into neighbouring
//! bits.
//!
//! Bring-up follows the JEDEC three stages:
//!   1. precharge all banks (DMCR.MRSET = 0), settle
//!   2. enable auto-refresh, let a few refresh cycles run
//!   3. mode register set with the reduced geometry, then steady-state DMCR
//!
//! Nothing is read back here; the caller runs its own RAM check.

use bitflags::bitflags;

use crate::hw::{emc, Delay, RegisterBus};

bitflags! {
    /// DMCR flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Dmcr: u32 {
        const RMODE = 1 << 25;
        const RFSH  = 1 << 24;
        const MRSET = 1 << 23;
        const PDM   = 1 << 18;
        const EPIN  = 1 << 17;
    }
}

const BW_SHIFT: u32 = 31;
const CA_SHIFT: u32 = 26;
const RA_SHIFT: u32 = 20;
const BA_SHIFT: u32 = 19;
const TRAS_SHIFT: u32 = 13;
const RCD_SHIFT: u32 = 11;
const TPC_SHIFT: u32 = 8;
const TRWL_SHIFT: u32 = 5;
const TRC_SHIFT: u32 = 2;
const TCL_SHIFT: u32 = 0;

const SDMR_CAS_SHIFT: u32 = 4;
const SDMR_BT_SEQ: u32 = 0 << 3;
const SDMR_OM_NORMAL: u32 = 0 << 7;
const SDMR_BL_4: u32 = 2;

/// Refresh counter clock = CKO / 64.
pub const RTCSR_CKS_64: u32 = 3;

/// Wait after precharge-all (datasheets ask for > 200 µs).
pub const PRECHARGE_SETTLE_US: u32 = 1000;
/// Wait for several auto-refresh cycles before the mode register set.
pub const AUTO_REFRESH_SETTLE_US: u32 = 1000;

// Cycle field ranges, in clocks.
const TRAS_MIN: u32 = 4;
const TRAS_MAX: u32 = 11;
const RCD_MAX: u32 = 3;
const TPC_MAX: u32 = 7;
const TRWL_MAX: u32 = 3;
const TRC_MAX: u32 = 14;
const REFRESH_MAX: u32 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasLatency {
    Two,
    Three,
}

impl CasLatency {
    const fn dmcr_field(self) -> u32 {
        match self {
            CasLatency::Two => 1 << TCL_SHIFT,
            CasLatency::Three => 2 << TCL_SHIFT,
        }
    }

    const fn sdmr_field(self) -> u32 {
        match self {
            CasLatency::Two => 2 << SDMR_CAS_SHIFT,
            CasLatency::Three => 3 << SDMR_CAS_SHIFT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusWidth {
    Bits16,
    Bits32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankCount {
    Two,
    Four,
}

/// Row/column address widths and bank count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: u32,
    pub cols: u32,
    pub banks: BankCount,
}

impl Geometry {
    const fn validate(&self) -> Result<(), &'static str> {
        if self.rows < 11 || self.rows > 13 {
            return Err("SDRAM row address width must be 11..=13");
        }
        if self.cols < 8 || self.cols > 12 {
            return Err("SDRAM column address width must be 8..=12");
        }
        Ok(())
    }

    const fn dmcr_bits(&self) -> u32 {
        let ba = match self.banks {
            BankCount::Two => 0,
            BankCount::Four => 1,
        };
        ((self.rows - 11) << RA_SHIFT) | ((self.cols - 8) << CA_SHIFT) | (ba << BA_SHIFT)
    }
}

/// Device characteristics of the fitted SDRAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdramTimingProfile {
    pub cas_latency: CasLatency,
    /// RAS# active time.
    pub tras_ns: u32,
    /// RAS# to CAS# delay.
    pub rcd_ns: u32,
    /// RAS# precharge time.
    pub tpc_ns: u32,
    /// Refresh period.
    pub tref_ns: u32,
    /// Write latency.
    pub trwl_ns: u32,
    pub bus_width: BusWidth,
    /// Steady-state geometry.
    pub geometry: Geometry,
    /// Geometry assumed while programming the mode register.
    pub mrs_geometry: Geometry,
}

impl SdramTimingProfile {
    pub const fn validate(&self) -> Result<(), &'static str> {
        if let Err(e) = self.geometry.validate() {
            return Err(e);
        }
        if let Err(e) = self.mrs_geometry.validate() {
            return Err(e);
        }
        Ok(())
    }

    /// Total size in bytes implied by the geometry.
    pub const fn memory_size(&self) -> u32 {
        let bus = match self.bus_width {
            BusWidth::Bits16 => 1,
            BusWidth::Bits32 => 2,
        };
        let banks = match self.geometry.banks {
            BankCount::Two => 1,
            BankCount::Four => 2,
        };
        1 << (self.geometry.rows + self.geometry.cols + bus + banks)
    }

    const fn bus_bits(&self) -> u32 {
        match self.bus_width {
            BusWidth::Bits16 => 1 << BW_SHIFT,
            BusWidth::Bits32 => 0,
        }
    }
}

/// Clamped cycle counts, already encoded for their DMCR fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingFields {
    pub tras: u32,
    pub rcd: u32,
    pub tpc: u32,
    pub trwl: u32,
    pub trc: u32,
}

impl TimingFields {
    pub fn compute(p: &SdramTimingProfile, tck_ns: u32) -> Self {
        let tras = (p.tras_ns / tck_ns).clamp(TRAS_MIN, TRAS_MAX);
        let rcd = (p.rcd_ns / tck_ns).min(RCD_MAX);
        let tpc = (p.tpc_ns / tck_ns).min(TPC_MAX);
        let trwl = (p.trwl_ns / tck_ns).min(TRWL_MAX);
        let trc = (p.tras_ns.saturating_add(p.tpc_ns) / tck_ns).min(TRC_MAX);
        Self {
            tras: tras - TRAS_MIN,
            rcd,
            tpc,
            trwl,
            trc: (trc + 1) >> 1,
        }
    }

    const fn dmcr_bits(&self) -> u32 {
        (self.tras << TRAS_SHIFT)
            | (self.rcd << RCD_SHIFT)
            | (self.tpc << TPC_SHIFT)
            | (self.trwl << TRWL_SHIFT)
            | (self.trc << TRC_SHIFT)
    }
}

/// Register image computed for one bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmcrPlan {
    /// Memory clock period, whole nanoseconds.
    pub tck_ns: u32,
    pub fields: TimingFields,
    /// Reduced-geometry value used only around the mode register set.
    pub reset: u32,
    /// Full-geometry value with timing.
    pub full: u32,
    /// SDRAM mode register value.
    pub mode: u32,
    /// Refresh time constant (RTCOR).
    pub refresh: u32,
}

/// MemoryTimingPlanner: profile + memory clock → DMCR values.
pub fn plan(p: &SdramTimingProfile, mclk_hz: u32) -> Result<DmcrPlan, &'static str> {
    p.validate()?;
    if mclk_hz == 0 {
        return Err("memory clock is zero");
    }
    let tck_ns = 1_000_000_000 / mclk_hz;
    if tck_ns == 0 {
        return Err("memory clock above 1 GHz");
    }

    let common = p.bus_bits() | Dmcr::EPIN.bits() | p.cas_latency.dmcr_field();
    let reset = common | p.mrs_geometry.dmcr_bits();
    let fields = TimingFields::compute(p, tck_ns);
    let full = common | p.geometry.dmcr_bits() | fields.dmcr_bits();

    let mode = SDMR_BT_SEQ | SDMR_OM_NORMAL | SDMR_BL_4 | p.cas_latency.sdmr_field();

    let refresh = (p.tref_ns / tck_ns / 64 + 1).min(REFRESH_MAX);

    Ok(DmcrPlan { tck_ns, fields, reset, full, mode, refresh })
}

/// MemoryController: run the three-stage bring-up with a computed plan.
pub fn configure(
    p: &SdramTimingProfile,
    mclk_hz: u32,
    regs: &mut dyn RegisterBus,
    delay: &mut dyn Delay,
) -> Result<DmcrPlan, &'static str> {
    let plan = plan(p, mclk_hz)?;
    log::debug!(target: "sdram", "tCK {} ns, DMCR {:#010x}, refresh {}", plan.tck_ns, plan.full, plan.refresh);

    // No bus release, refresh counter stopped.
    regs.write(emc::BCR, 0);
    regs.write(emc::RTCSR, 0);

    // Stage 1: precharge all banks.
    regs.write(emc::DMCR, plan.full);
    regs.write(emc::sdmr(plan.mode), 0);
    delay.udelay(PRECHARGE_SETTLE_US);

    // Stage 2: auto-refresh.
    regs.write(emc::DMCR, plan.full | Dmcr::RFSH.bits());
    regs.write(emc::RTCOR, plan.refresh);
    regs.write(emc::RTCNT, 0);
    regs.write(emc::RTCSR, RTCSR_CKS_64);
    delay.udelay(AUTO_REFRESH_SETTLE_US);

    // Stage 3: mode register set, then steady state.
    regs.write(emc::DMCR, plan.reset | Dmcr::RFSH.bits() | Dmcr::MRSET.bits());
    regs.write(emc::sdmr(plan.mode), 0);
    regs.write(emc::DMCR, plan.full | Dmcr::RFSH.bits() | Dmcr::MRSET.bits());

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::Block;
    use crate::testing::{RecordingDelay, SimRegs};

    const TIMING_MASK: u32 = 0xFF7C;

    fn hynix() -> SdramTimingProfile {
        SdramTimingProfile {
            cas_latency: CasLatency::Three,
            tras_ns: 42,
            rcd_ns: 18,
            tpc_ns: 18,
            tref_ns: 15625,
            trwl_ns: 7,
            bus_width: BusWidth::Bits16,
            geometry: Geometry { rows: 13, cols: 9, banks: BankCount::Four },
            mrs_geometry: Geometry { rows: 11, cols: 9, banks: BankCount::Two },
        }
    }

    #[test]
    fn fields_at_120mhz() {
        let plan = plan(&hynix(), 120_000_000).unwrap();
        assert_eq!(plan.tck_ns, 8);
        assert_eq!(plan.fields, TimingFields { tras: 1, rcd: 2, tpc: 2, trwl: 0, trc: 4 });
        assert_eq!(plan.refresh, 31);
        assert_eq!(plan.mode, 0x32);
    }

    #[test]
    fn reset_and_full_geometry() {
        let plan = plan(&hynix(), 120_000_000).unwrap();
        assert_eq!((plan.reset >> RA_SHIFT) & 0x3, 0);
        assert_eq!((plan.reset >> BA_SHIFT) & 0x1, 0);
        assert_eq!((plan.full >> RA_SHIFT) & 0x3, 2);
        assert_eq!((plan.full >> CA_SHIFT) & 0x7, 1);
        assert_eq!((plan.full >> BA_SHIFT) & 0x1, 1);
        assert_eq!(plan.full >> BW_SHIFT, 1);
        assert_eq!(plan.full & 0x3, 2);
        // Timing lives only in the full value.
        assert_eq!(plan.reset & TIMING_MASK, 0);
    }

    #[test]
    fn oversized_timing_clamps_to_field_max() {
        let mut p = hynix();
        p.tras_ns = 10_000;
        p.rcd_ns = 10_000;
        p.tpc_ns = 10_000;
        p.trwl_ns = 10_000;
        p.tref_ns = u32::MAX;
        let plan = plan(&p, 120_000_000).unwrap();
        assert_eq!(plan.fields, TimingFields { tras: 7, rcd: 3, tpc: 7, trwl: 3, trc: 7 });
        assert_eq!(plan.refresh, 0xFF);
        // Every timing field saturated, nothing bled into the flag bits.
        assert_eq!(plan.full & TIMING_MASK, TIMING_MASK);
        assert!(plan.full & Dmcr::EPIN.bits() != 0);
        assert_eq!(plan.full & (Dmcr::RFSH | Dmcr::MRSET).bits(), 0);
    }

    #[test]
    fn short_tras_clamps_to_minimum() {
        let mut p = hynix();
        p.tras_ns = 1;
        let plan = plan(&p, 120_000_000).unwrap();
        assert_eq!(plan.fields.tras, 0);
    }

    #[test]
    fn bad_geometry_rejected() {
        let mut p = hynix();
        p.geometry.rows = 14;
        assert!(plan(&p, 120_000_000).is_err());
        assert!(plan(&hynix(), 2_000_000_000).is_err());
    }

    #[test]
    fn memory_size_from_geometry() {
        assert_eq!(hynix().memory_size(), 32 << 20);
    }

    #[test]
    fn three_stage_sequence() {
        let mut regs = SimRegs::new();
        let mut delay = RecordingDelay::default();
        let plan = configure(&hynix(), 120_000_000, &mut regs, &mut delay).unwrap();
        let rfsh = Dmcr::RFSH.bits();
        let mrset = Dmcr::MRSET.bits();
        assert_eq!(
            regs.writes_to(Block::Emc),
            vec![
                (emc::BCR, 0),
                (emc::RTCSR, 0),
                (emc::DMCR, plan.full),
                (emc::sdmr(plan.mode), 0),
                (emc::DMCR, plan.full | rfsh),
                (emc::RTCOR, 31),
                (emc::RTCNT, 0),
                (emc::RTCSR, RTCSR_CKS_64),
                (emc::DMCR, plan.reset | rfsh | mrset),
                (emc::sdmr(plan.mode), 0),
                (emc::DMCR, plan.full | rfsh | mrset),
            ]
        );
        assert_eq!(delay.waits, vec![PRECHARGE_SETTLE_US, AUTO_REFRESH_SETTLE_US]);
    }
}
