//! Link quality and service classes
//!
//! Each labeled link carries loss/delay/jitter figures fed by an external
//! probe. A link whose loss reaches 100% is administratively down for
//! policy selection. On top of that, packets map to RFC 4594-style service
//! classes by DSCP; a label whose link quality exceeds the class tolerance
//! is skipped during selection.

/// Measured quality of a link. Loss in percent, delay and jitter in
/// milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quality {
    pub loss: u32,
    pub delay: u32,
    pub jitter: u32,
}

/// Loss level at which a link stops carrying policy traffic.
pub const LOSS_DOWN: u32 = 100;

impl Quality {
    /// True when the link is usable at all (loss below the down threshold).
    pub fn usable(&self) -> bool {
        self.loss < LOSS_DOWN
    }

    /// True when this quality fits within a tolerance envelope.
    pub fn within(&self, tol: Tolerance) -> bool {
        self.loss <= tol.loss && self.delay <= tol.delay && self.jitter <= tol.jitter
    }
}

/// Tolerance envelope of a service class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    pub loss: u32,
    pub delay: u32,
    pub jitter: u32,
}

const UNBOUNDED: u32 = u32::MAX;

/// RFC 4594 service classes, derived from the packet DSCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    Telephony,
    Signaling,
    RealTimeInteractive,
    MultimediaConferencing,
    BroadcastVideo,
    MultimediaStreaming,
    LowLatencyData,
    Oam,
    HighThroughputData,
    LowPriorityData,
    Standard,
}

impl ServiceClass {
    /// Map a DSCP codepoint to its service class. Unknown codepoints fall
    /// into Standard.
    pub fn from_dscp(dscp: u8) -> Self {
        match dscp & 0x3F {
            46 => ServiceClass::Telephony,                // EF
            40 => ServiceClass::Signaling,                // CS5
            32 => ServiceClass::RealTimeInteractive,      // CS4
            34 | 36 | 38 => ServiceClass::MultimediaConferencing, // AF41-43
            24 => ServiceClass::BroadcastVideo,           // CS3
            26 | 28 | 30 => ServiceClass::MultimediaStreaming, // AF31-33
            18 | 20 | 22 => ServiceClass::LowLatencyData, // AF21-23
            16 => ServiceClass::Oam,                      // CS2
            10 | 12 | 14 => ServiceClass::HighThroughputData, // AF11-13
            8 => ServiceClass::LowPriorityData,           // CS1
            _ => ServiceClass::Standard,
        }
    }

    /// Static tolerance table. Standard and low-priority traffic accepts
    /// any link.
    pub fn tolerance(&self) -> Tolerance {
        match self {
            ServiceClass::Telephony => Tolerance {
                loss: 1,
                delay: 150,
                jitter: 30,
            },
            ServiceClass::Signaling => Tolerance {
                loss: 1,
                delay: 200,
                jitter: 50,
            },
            ServiceClass::RealTimeInteractive => Tolerance {
                loss: 1,
                delay: 100,
                jitter: 30,
            },
            ServiceClass::MultimediaConferencing => Tolerance {
                loss: 2,
                delay: 200,
                jitter: 50,
            },
            ServiceClass::BroadcastVideo => Tolerance {
                loss: 2,
                delay: 200,
                jitter: 50,
            },
            ServiceClass::MultimediaStreaming => Tolerance {
                loss: 5,
                delay: 400,
                jitter: 100,
            },
            ServiceClass::LowLatencyData => Tolerance {
                loss: 5,
                delay: 400,
                jitter: UNBOUNDED,
            },
            ServiceClass::Oam => Tolerance {
                loss: 10,
                delay: UNBOUNDED,
                jitter: UNBOUNDED,
            },
            ServiceClass::HighThroughputData => Tolerance {
                loss: 10,
                delay: UNBOUNDED,
                jitter: UNBOUNDED,
            },
            ServiceClass::LowPriorityData | ServiceClass::Standard => Tolerance {
                loss: UNBOUNDED,
                delay: UNBOUNDED,
                jitter: UNBOUNDED,
            },
        }
    }
}
