use crate::virtual_machine::errors::VMError;

/// Largest register file addressable by a one-byte register operand.
pub const MAX_REGISTERS: usize = 256;

/// Register file holding VM storage.
///
/// A fixed number of `f64` slots, all zero on creation. The size never
/// changes after construction.
#[derive(Clone, Debug)]
pub struct Registers {
    regs: Vec<f64>,
}

impl Registers {
    /// Creates a new register file with `count` registers.
    ///
    /// Returns [`VMError::InvalidRegisterCount`] unless `count` is in `1..=256`.
    pub fn new(count: usize) -> Result<Self, VMError> {
        if count == 0 || count > MAX_REGISTERS {
            return Err(VMError::InvalidRegisterCount(count));
        }
        Ok(Self {
            regs: vec![0.0; count],
        })
    }

    /// Returns the value in register `idx`.
    ///
    /// Returns [`VMError::RegisterNotFound`] if `idx` is out of bounds.
    pub fn get(&self, idx: u8) -> Result<f64, VMError> {
        self.regs
            .get(idx as usize)
            .copied()
            .ok_or(VMError::RegisterNotFound {
                index: idx,
                available: self.regs.len(),
            })
    }

    /// Stores a value into register `idx`.
    ///
    /// Returns [`VMError::RegisterNotFound`] if `idx` is out of bounds.
    pub fn set(&mut self, idx: u8, v: f64) -> Result<(), VMError> {
        let available = self.regs.len();
        let slot = self
            .regs
            .get_mut(idx as usize)
            .ok_or(VMError::RegisterNotFound {
                index: idx,
                available,
            })?;
        *slot = v;
        Ok(())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.regs
    }
}

impl Default for Registers {
    /// A 32-register file, matching [`super::DEFAULT_REGISTER_COUNT`].
    fn default() -> Self {
        Self {
            regs: vec![0.0; super::DEFAULT_REGISTER_COUNT],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_registers_are_zero() {
        let regs = Registers::new(32).unwrap();
        for i in 0..32u8 {
            assert_eq!(regs.get(i).unwrap(), 0.0);
        }
    }

    #[test]
    fn set_then_get() {
        let mut regs = Registers::new(16).unwrap();
        regs.set(5, 15.0).unwrap();
        assert_eq!(regs.get(5).unwrap(), 15.0);
        assert_eq!(regs.get(5).unwrap(), 15.0);
        assert_eq!(regs.get(4).unwrap(), 0.0);
    }

    #[test]
    fn out_of_range_index() {
        let mut regs = Registers::new(16).unwrap();
        assert_eq!(
            regs.set(32, 3.0),
            Err(VMError::RegisterNotFound {
                index: 32,
                available: 16
            })
        );
        assert!(matches!(
            regs.get(16),
            Err(VMError::RegisterNotFound { index: 16, .. })
        ));
    }

    #[test]
    fn full_byte_range_fits() {
        let mut regs = Registers::new(MAX_REGISTERS).unwrap();
        regs.set(255, 1.0).unwrap();
        assert_eq!(regs.get(255).unwrap(), 1.0);
    }

    #[test]
    fn invalid_counts_rejected() {
        assert_eq!(Registers::new(0).err(), Some(VMError::InvalidRegisterCount(0)));
        assert_eq!(
            Registers::new(257).err(),
            Some(VMError::InvalidRegisterCount(257))
        );
    }
}
