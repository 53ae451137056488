/// An 8-bit RGBA color with straight (non-premultiplied) alpha.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Pixel {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}
impl Pixel {
    pub fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self::new(red, green, blue, u8::MAX)
    }

    pub fn grey(level: u8, alpha: u8) -> Self {
        Self::new(level, level, level, alpha)
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha == u8::MAX
    }
}
