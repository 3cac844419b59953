/// Whether `candidate` lies in the circular inclusive range `[base, top]`.
///
/// When `base > top` the range wraps past `u32::MAX` back through zero.
pub fn inside(base: u32, top: u32, candidate: u32) -> bool {
    if base <= top {
        base <= candidate && candidate <= top
    } else {
        candidate >= base || candidate <= top
    }
}
