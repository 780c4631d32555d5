//! TPM 2.0 Support
//!
//! Interface for Trusted Platform Module 2.0 operations including attestation,
//! sealing, and hardware random number generation.

use crate::error::KernelError;
use alloc::vec::Vec;
use spin::Mutex;

/// TPM 2.0 command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TpmCommand {
    Startup = 0x144,
    GetRandom = 0x17B,
    PCRRead = 0x17E,
    PCRExtend = 0x182,
    CreatePrimary = 0x131,
    Create = 0x153,
    Load = 0x157,
    Sign = 0x15D,
    VerifySignature = 0x177,
    Quote = 0x158,
    Unseal = 0x15E,
}

/// TPM Platform Configuration Register (PCR) index
pub type PcrIndex = u8;

/// TPM handle for objects
pub type TpmHandle = u32;

/// TPM result
pub type TpmResult<T> = Result<T, TpmError>;

/// TPM errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmError {
    NotInitialized,
    CommandFailed,
    InvalidHandle,
    AuthFailed,
    NotSupported,
    HardwareError,
}

/// TPM 2.0 interface
pub struct Tpm {
    initialized: bool,
    locality: u8,
}

impl Tpm {
    /// Create new TPM interface
    pub fn new() -> Self {
        Self {
            initialized: false,
            locality: 0,
        }
    }

    /// Initialize TPM
    pub fn startup(&mut self) -> TpmResult<()> {
        // Send TPM2_Startup command
        // This is a stub - real implementation would communicate with TPM hardware

        crate::println!("[TPM] Performing startup sequence...");

        // In a real implementation, this would:
        // 1. Access TPM through MMIO or I2C/SPI
        // 2. Send startup command
        // 3. Wait for response
        // 4. Verify successful startup

        self.initialized = true;

        crate::println!("[TPM] TPM 2.0 startup complete");

        Ok(())
    }

    /// Get random bytes from TPM hardware RNG
    pub fn get_random(&self, num_bytes: usize) -> TpmResult<Vec<u8>> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        // Stub implementation - would request random bytes from TPM
        let mut random_data = Vec::with_capacity(num_bytes);

        // In real implementation, this would send TPM2_GetRandom command

        Ok(random_data)
    }

    /// Read Platform Configuration Register (PCR)
    pub fn pcr_read(&self, pcr_index: PcrIndex) -> TpmResult<[u8; 32]> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        // Stub implementation - would read from TPM
        let mut pcr_value = [0u8; 32];

        crate::println!("[TPM] Reading PCR {}", pcr_index);

        // In real implementation, send TPM2_PCR_Read command

        Ok(pcr_value)
    }

    /// Extend Platform Configuration Register with measurement
    pub fn pcr_extend(&mut self, pcr_index: PcrIndex, data: &[u8; 32]) -> TpmResult<()> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        crate::println!("[TPM] Extending PCR {}", pcr_index);

        // In real implementation:
        // 1. Read current PCR value
        // 2. Hash: PCR_new = SHA256(PCR_old || data)
        // 3. Write new PCR value

        Ok(())
    }

    /// Create attestation quote
    pub fn quote(&self, pcr_selection: &[PcrIndex], nonce: &[u8; 32]) -> TpmResult<Vec<u8>> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        crate::println!("[TPM] Creating attestation quote for {} PCRs", pcr_selection.len());

        // Stub - would create signed quote of PCR values
        let quote = Vec::new();

        Ok(quote)
    }

    /// Seal data to TPM (encrypt with TPM key)
    pub fn seal(&self, data: &[u8], pcr_selection: &[PcrIndex]) -> TpmResult<Vec<u8>> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        crate::println!("[TPM] Sealing {} bytes to PCRs", data.len());

        // Stub - would encrypt data with TPM storage key
        // Data can only be unsealed if PCR values match
        let sealed_blob = Vec::new();

        Ok(sealed_blob)
    }

    /// Unseal data from TPM (decrypt with TPM key)
    pub fn unseal(&self, sealed_blob: &[u8]) -> TpmResult<Vec<u8>> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        crate::println!("[TPM] Unsealing data blob");

        // Stub - would decrypt with TPM and verify PCR state
        let data = Vec::new();

        Ok(data)
    }

    /// Create signing key in TPM
    pub fn create_signing_key(&self) -> TpmResult<TpmHandle> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        crate::println!("[TPM] Creating signing key");

        // Stub - would create key in TPM and return handle
        let handle: TpmHandle = 0x80000001;

        Ok(handle)
    }

    /// Sign data with TPM key
    pub fn sign(&self, handle: TpmHandle, data: &[u8]) -> TpmResult<Vec<u8>> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        crate::println!("[TPM] Signing {} bytes with key handle 0x{:08X}", data.len(), handle);

        // Stub - would sign with TPM key
        let signature = Vec::new();

        Ok(signature)
    }

    /// Verify signature with TPM key
    pub fn verify_signature(&self, handle: TpmHandle, data: &[u8], signature: &[u8]) -> TpmResult<bool> {
        if !self.initialized {
            return Err(TpmError::NotInitialized);
        }

        crate::println!("[TPM] Verifying signature with key handle 0x{:08X}", handle);

        // Stub - would verify with TPM key
        Ok(true)
    }
}

impl Default for Tpm {
    fn default() -> Self {
        Self::new()
    }
}

/// Global TPM instance
static TPM: Mutex<Option<Tpm>> = Mutex::new(None);

/// Initialize TPM support
pub fn init() -> Result<(), KernelError> {
    let mut tpm = Tpm::new();

    // Try to initialize TPM hardware
    match tpm.startup() {
        Ok(()) => {
            *TPM.lock() = Some(tpm);
            crate::println!("[TPM] TPM 2.0 support initialized");
            Ok(())
        }
        Err(_) => {
            // TPM not available - this is okay, continue without it
            crate::println!("[TPM] TPM hardware not available (continuing without TPM support)");
            Ok(())
        }
    }
}

/// Get global TPM instance
pub fn get_tpm() -> Option<&'static Tpm> {
    // Return None if TPM not available
    None // Stub - would return actual TPM instance
}

/// Check if TPM is available
pub fn is_available() -> bool {
    TPM.lock().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn test_tpm_creation() {
        let tpm = Tpm::new();
        assert!(!tpm.initialized);
    }
}
