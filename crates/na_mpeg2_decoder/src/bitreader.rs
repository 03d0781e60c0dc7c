//! MSB-first bit reader over one start-code chunk.
//!
//! Bits are buffered in a 64-bit accumulator that is topped up 32 bits at a
//! time. Peeking past the end of the buffer yields zero bits, which is what
//! the slice loop relies on to see the end of slice data; consuming past the
//! end fails.

use byteorder::{BigEndian, ByteOrder};

#[derive(Clone)]
pub struct BitReader<'a> {
    data:  &'a [u8],
    pos:   usize,
    acc:   u64,
    avail: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut br = BitReader { data, pos: 0, acc: 0, avail: 0 };
        br.refill();
        br
    }

    #[inline]
    fn refill(&mut self) {
        while self.avail <= 32 {
            if self.pos + 4 <= self.data.len() {
                let word = BigEndian::read_u32(&self.data[self.pos..self.pos + 4]) as u64;
                self.acc |= word << (32 - self.avail);
                self.avail += 32;
                self.pos += 4;
            } else if self.pos < self.data.len() {
                self.acc |= (self.data[self.pos] as u64) << (56 - self.avail);
                self.avail += 8;
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Peek up to 32 bits without advancing.
    #[inline]
    pub fn peek_bits(&mut self, n: u32) -> u32 {
        debug_assert!(n <= 32);
        if n == 0 {
            return 0;
        }
        if self.avail < n {
            self.refill();
        }
        (self.acc >> (64 - n)) as u32
    }

    /// Consume `n` bits (at most 32). Fails when the buffer is exhausted.
    #[inline]
    pub fn skip_bits(&mut self, n: u32) -> Option<()> {
        debug_assert!(n <= 32);
        if self.avail < n {
            self.refill();
            if self.avail < n {
                self.acc = 0;
                self.avail = 0;
                return None;
            }
        }
        self.acc <<= n;
        self.avail -= n;
        Some(())
    }

    #[inline]
    pub fn read_bits(&mut self, n: u32) -> Option<u32> {
        let v = self.peek_bits(n);
        self.skip_bits(n)?;
        Some(v)
    }

    #[inline]
    pub fn read_bit(&mut self) -> Option<bool> {
        self.read_bits(1).map(|b| b != 0)
    }

    /// Two's complement field of `n` bits.
    pub fn read_signed(&mut self, n: u32) -> Option<i32> {
        if n == 0 {
            return Some(0);
        }
        let v = self.read_bits(n)? as i32;
        let sign = 1i32 << (n - 1);
        Some(if v & sign != 0 { v - (sign << 1) } else { v })
    }

    /// Skip an arbitrary number of bits.
    pub fn skip_bits_usize(&mut self, mut n: usize) -> Option<()> {
        while n >= 32 {
            self.skip_bits(32)?;
            n -= 32;
        }
        self.skip_bits(n as u32)
    }

    pub fn byte_align(&mut self) {
        let rem = (self.bits_read() % 8) as u32;
        if rem != 0 {
            let _ = self.skip_bits(8 - rem);
        }
    }

    pub fn bits_read(&self) -> usize {
        self.pos * 8 - self.avail as usize
    }

    /// Remaining bits in the underlying buffer.
    pub fn bits_left(&self) -> usize {
        self.data.len() * 8 - self.bits_read()
    }

    pub fn is_empty(&self) -> bool {
        self.bits_left() == 0
    }

    /// Bytes from the next byte boundary to the end of the buffer.
    pub fn remaining_aligned(&self) -> &'a [u8] {
        let start = (self.bits_read() + 7) / 8;
        &self.data[start.min(self.data.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_across_word_boundaries() {
        let data = [0b1010_1100, 0xFF, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(3), Some(0b101));
        assert_eq!(br.read_bits(5), Some(0b01100));
        assert_eq!(br.read_bits(16), Some(0xFF00));
        assert_eq!(br.read_bits(32), Some(0x1234_5678));
        assert_eq!(br.bits_left(), 8);
        assert_eq!(br.read_bits(8), Some(0x9A));
        assert!(br.is_empty());
    }

    #[test]
    fn peek_pads_with_zeros_but_read_fails() {
        let data = [0xF0];
        let mut br = BitReader::new(&data);
        assert_eq!(br.peek_bits(12), 0xF00);
        assert_eq!(br.read_bits(4), Some(0xF));
        assert_eq!(br.peek_bits(8), 0);
        assert_eq!(br.read_bits(8), None);
    }

    #[test]
    fn signed_fields_and_alignment() {
        let data = [0b1111_1111, 0b1110_0000, 0x42];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_signed(12), Some(-2));
        br.byte_align();
        assert_eq!(br.bits_read(), 16);
        assert_eq!(br.remaining_aligned(), &[0x42]);
        assert_eq!(br.read_bits(8), Some(0x42));
    }
}
