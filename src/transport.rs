//! Serial transport the modem is attached to
//!
//! The transport owns the receive buffer and does the line framing: every
//! LF received closes a line, which is then counted as pending until it is
//! consumed with [`Transport::read_line`]. A CR alone does not close a line.

use embedded_svc::io::Error;

pub trait Transport {
    type Error: Error;

    /// Write raw bytes to the modem.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read up to `buf.len()` raw bytes, returning 0 when nothing is buffered.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Pop the oldest complete line, framing bytes included.
    ///
    /// Lines longer than `buf` are truncated; the returned value is the
    /// number of bytes copied.
    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Complete lines received and not consumed yet.
    fn pending_lines(&self) -> usize;

    /// Discard everything received so far.
    fn clear_rx(&mut self);

    /// Size of the receive buffer.
    fn rx_capacity(&self) -> usize;

    fn suspend(&mut self);

    fn resume(&mut self);

    /// Raw view of the receive buffer, used for diagnostics only.
    fn rx_contents(&self) -> &[u8] {
        &[]
    }
}

impl<T> Transport for &mut T
where
    T: Transport,
{
    type Error = T::Error;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read(buf)
    }

    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read_line(buf)
    }

    fn pending_lines(&self) -> usize {
        (**self).pending_lines()
    }

    fn clear_rx(&mut self) {
        (**self).clear_rx()
    }

    fn rx_capacity(&self) -> usize {
        (**self).rx_capacity()
    }

    fn suspend(&mut self) {
        (**self).suspend()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn rx_contents(&self) -> &[u8] {
        (**self).rx_contents()
    }
}
