//! DMA elements

use crate::descriptor::Width;

mod private {
    pub trait Sealed {}

    impl Sealed for u8 {}
    impl Sealed for i8 {}
    impl Sealed for u16 {}
    impl Sealed for i16 {}
    impl Sealed for u32 {}
    impl Sealed for i32 {}
}

/// An element that can be transferred by the µDMA controller
///
/// This trait is sealed. It's implemented for the 8, 16, and 32 bit
/// integers.
pub trait Element: Copy + private::Sealed {
    /// The width the controller uses to move this element
    const WIDTH: Width;
}

impl Element for u8 {
    const WIDTH: Width = Width::Byte;
}

impl Element for i8 {
    const WIDTH: Width = Width::Byte;
}

impl Element for u16 {
    const WIDTH: Width = Width::HalfWord;
}

impl Element for i16 {
    const WIDTH: Width = Width::HalfWord;
}

impl Element for u32 {
    const WIDTH: Width = Width::Word;
}

impl Element for i32 {
    const WIDTH: Width = Width::Word;
}
