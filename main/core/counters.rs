//! Error and statistics counter bank. BSD-facade functions report failure
//! only through their return code; the detailed cause lands here.

/// MLD engine counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MldpCtrs {
    /// Received MLD messages accepted and handled.
    pub rx_msg_ok: u64,
    /// Received MLD messages dropped by validation.
    pub rx_pkt_discard: u64,
    /// Reports and done messages dropped by the transmit path.
    pub tx_pkt_discard: u64,
    pub join_fault: u64,
    pub leave_fault: u64,
}

/// Application socket helper counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SockCtrs {
    /// Attempts beyond the first made by the retry wrappers.
    pub app_retry: u64,
    /// Wrapper invocations that gave up with an error.
    pub app_fault: u64,
    /// Saved per-socket timeouts that could not be restored after the call.
    pub timeout_restore_skipped: u64,
}

/// BSD facade counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BsdCtrs {
    /// Calls that returned -1.
    pub fault: u64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NetCtrs {
    pub mldp: MldpCtrs,
    pub sock: SockCtrs,
    pub bsd: BsdCtrs,
}
