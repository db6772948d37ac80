use serde::{Deserialize, Serialize};

/// Stride of one index digit pair inside a packed cell address (`XXYYZZ`).
const STRIDE: i32 = 100;

/// Grid position of one crystal inside the segmented array.
///
/// Cell addresses are the copy numbers assigned at placement time:
/// `ix * 10000 + iy * 100 + iz`, each index in `0..100`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex {
    pub ix: u8,
    pub iy: u8,
    pub iz: u8,
}

impl CellIndex {
    /// Unpacks a cell address. Returns `None` for addresses outside the
    /// `XXYYZZ` domain (negative or more than six digits).
    pub fn from_address(address: i32) -> Option<Self> {
        if !(0..STRIDE * STRIDE * STRIDE).contains(&address) {
            return None;
        }
        Some(CellIndex {
            ix: (address / (STRIDE * STRIDE)) as u8,
            iy: ((address % (STRIDE * STRIDE)) / STRIDE) as u8,
            iz: (address % STRIDE) as u8,
        })
    }

    /// Whether this index lies inside an array of the given dimensions.
    pub fn within(self, dims: [u8; 3]) -> bool {
        self.ix < dims[0] && self.iy < dims[1] && self.iz < dims[2]
    }
}
