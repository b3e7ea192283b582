//! Tagged unions: a discriminant word followed by a payload word.

use super::memory;
use crate::error::AbiError;

/// Where the payload sits relative to the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantLayout {
    pub payload_offset: u32,
}

impl VariantLayout {
    /// Return-area layout used by wasi-ce style guests.
    pub const RET_AREA: Self = Self { payload_offset: 8 };
}

impl Default for VariantLayout {
    fn default() -> Self {
        Self::RET_AREA
    }
}

/// A closed enumeration of error codes carried in a result's failure case.
pub trait ErrorCode: Sized {
    /// Type name used in discriminant errors.
    const NAME: &'static str;

    fn from_code(code: i32) -> Option<Self>;

    fn code(&self) -> i32;
}

/// Discriminant and payload as loaded from guest memory, not yet interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawVariant {
    pub discriminant: i32,
    pub payload: i32,
}

/// Load a variant at `ptr`. The memory borrow ends here, so lifting the
/// payload may call back into the store.
pub fn load_variant(mem: &[u8], ptr: i32, layout: VariantLayout) -> Result<RawVariant, AbiError> {
    Ok(RawVariant {
        discriminant: memory::load::<i32>(mem, ptr, 0)?,
        payload: memory::load::<i32>(mem, ptr, layout.payload_offset)?,
    })
}

impl RawVariant {
    /// Check the discriminant against a variant with `cases` cases.
    pub fn case(&self, ty: &'static str, cases: u32) -> Result<u32, AbiError> {
        match u32::try_from(self.discriminant) {
            Ok(case) if case < cases => Ok(case),
            _ => Err(AbiError::InvalidDiscriminant {
                ty,
                discriminant: self.discriminant,
            }),
        }
    }

    /// `0` is success, lifted through `lift_ok`; `1` is an error code.
    pub fn into_result<T, E: ErrorCode>(
        self,
        lift_ok: impl FnOnce(i32) -> Result<T, AbiError>,
    ) -> Result<Result<T, E>, AbiError> {
        match self.case("result", 2)? {
            0 => Ok(Ok(lift_ok(self.payload)?)),
            _ => Ok(Err(error_code(self.payload)?)),
        }
    }

    /// `0` is none, `1` is some, lifted through `lift`.
    pub fn into_option<T>(self, lift: impl FnOnce(i32) -> Result<T, AbiError>) -> Result<Option<T>, AbiError> {
        match self.case("option", 2)? {
            0 => Ok(None),
            _ => Ok(Some(lift(self.payload)?)),
        }
    }
}

/// Interpret `code` as a member of the closed enumeration `E`.
pub fn error_code<E: ErrorCode>(code: i32) -> Result<E, AbiError> {
    E::from_code(code).ok_or(AbiError::InvalidDiscriminant {
        ty: E::NAME,
        discriminant: code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Code {
        Ok,
        Failed,
    }

    impl ErrorCode for Code {
        const NAME: &'static str = "code";

        fn from_code(code: i32) -> Option<Self> {
            match code {
                0 => Some(Code::Ok),
                1 => Some(Code::Failed),
                _ => None,
            }
        }

        fn code(&self) -> i32 {
            match self {
                Code::Ok => 0,
                Code::Failed => 1,
            }
        }
    }

    fn ret_area(tag: i32, payload: i32) -> Vec<u8> {
        let mut mem = vec![0u8; 32];
        memory::store(&mut mem, 8, 0, tag).unwrap();
        memory::store(&mut mem, 8, 8, payload).unwrap();
        mem
    }

    #[test]
    fn success_case_lifts_payload() {
        let mem = ret_area(0, 42);
        let raw = load_variant(&mem, 8, VariantLayout::RET_AREA).unwrap();
        let res: Result<i32, Code> = raw.into_result(Ok).unwrap();
        assert_eq!(res, Ok(42));
    }

    #[test]
    fn failure_case_yields_error_code() {
        let mem = ret_area(1, 1);
        let raw = load_variant(&mem, 8, VariantLayout::default()).unwrap();
        let res: Result<i32, Code> = raw.into_result(|_| panic!("success lift must not run")).unwrap();
        assert_eq!(res, Err(Code::Failed));
    }

    #[test]
    fn unknown_discriminant_is_a_protocol_error() {
        for tag in [2, -1, i32::MAX] {
            let mem = ret_area(tag, 0);
            let raw = load_variant(&mem, 8, VariantLayout::RET_AREA).unwrap();
            let res = raw.into_result::<i32, Code>(Ok);
            assert!(matches!(
                res,
                Err(AbiError::InvalidDiscriminant { ty: "result", discriminant }) if discriminant == tag
            ));
        }
    }

    #[test]
    fn unknown_error_code_is_rejected() {
        let mem = ret_area(1, 9);
        let raw = load_variant(&mem, 8, VariantLayout::RET_AREA).unwrap();
        assert!(matches!(
            raw.into_result::<i32, Code>(Ok),
            Err(AbiError::InvalidDiscriminant { ty: "code", discriminant: 9 })
        ));
    }

    #[test]
    fn option_cases() {
        let none = RawVariant { discriminant: 0, payload: 7 };
        let some = RawVariant { discriminant: 1, payload: 7 };
        assert_eq!(none.into_option(Ok).unwrap(), None);
        assert_eq!(some.into_option(Ok).unwrap(), Some(7));
        assert!(RawVariant { discriminant: 3, payload: 0 }.into_option(Ok).is_err());
    }

    #[test]
    fn narrow_layout_and_bounds() {
        let mut mem = vec![0u8; 8];
        memory::store(&mut mem, 0, 4, 5i32).unwrap();
        let raw = load_variant(&mem, 0, VariantLayout { payload_offset: 4 }).unwrap();
        assert_eq!(raw, RawVariant { discriminant: 0, payload: 5 });
        assert!(matches!(
            load_variant(&mem, 0, VariantLayout::RET_AREA),
            Err(AbiError::OutOfBounds { .. })
        ));
    }
}
