//! Byte buffer and buffer pool integration tests

use std::io::{self, Read};
use std::thread;

use tidepool::pool::{BufferPool, ByteBuffer};

/// Reader that hands out its payload a few bytes per call
struct Trickle<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(self.data.len()).min(buf.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

/// Reader that fails after its payload
struct Broken<'a>(&'a [u8]);

impl Read for Broken<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.0.is_empty() {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        }
        let n = self.0.len().min(buf.len());
        buf[..n].copy_from_slice(&self.0[..n]);
        self.0 = &self.0[n..];
        Ok(n)
    }
}

#[test]
fn test_incremental_line_framing() {
    let pool = BufferPool::new();
    let mut buf = pool.get();
    let mut src = Trickle {
        data: b"PING\r\nSET key 5\r\nhello\r\nQUIT\r\n",
        chunk: 3,
    };

    let mut lines = Vec::new();
    loop {
        while let Some(line) = buf.read_line(b"\r\n") {
            lines.push(String::from_utf8(line.to_vec()).unwrap());
        }
        buf.compact();
        if buf.read_from(&mut src).unwrap() == 0 {
            break;
        }
    }

    assert_eq!(lines, ["PING", "SET key 5", "hello", "QUIT"]);
    assert_eq!(buf.remaining(), 0);
    pool.put(buf);
}

#[test]
fn test_length_prefixed_frames() {
    let mut out = ByteBuffer::new();
    for payload in [&b"alpha"[..], &b""[..], &b"gamma-ray"[..]] {
        out.write_u32(payload.len() as u32);
        out.write(payload);
    }

    let mut wire = Vec::new();
    out.write_to(&mut wire).unwrap();

    // Feed one byte at a time; a frame is decoded only once complete
    let mut inb = ByteBuffer::with_capacity(4);
    let mut frames = Vec::new();
    for byte in wire {
        inb.write_byte(byte);
        loop {
            let len = inb.pick_u32() as usize;
            if inb.remaining() < 4 || inb.remaining() - 4 < len {
                break;
            }
            inb.drain(4);
            frames.push(inb.read_bytes(len).unwrap().to_vec());
        }
    }

    assert_eq!(frames, vec![b"alpha".to_vec(), Vec::new(), b"gamma-ray".to_vec()]);
}

#[test]
fn test_read_all_surfaces_errors() {
    let mut buf = ByteBuffer::new();
    let err = buf.read_all(&mut Broken(b"partial")).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    // Bytes read before the failure are kept
    assert_eq!(buf.as_bytes(), b"partial");
}

#[test]
fn test_write_to_surfaces_errors() {
    struct Full;
    impl io::Write for Full {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WriteZero, "full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let mut buf = ByteBuffer::new();
    buf.write_str("data");
    assert_eq!(buf.write_to(&mut Full).unwrap_err().kind(), io::ErrorKind::WriteZero);
}

#[test]
fn test_pool_shared_across_threads() {
    let pool = BufferPool::new();

    thread::scope(|s| {
        for id in 0..8u64 {
            let pool = pool.clone();
            s.spawn(move || {
                for round in 0..200u64 {
                    let mut buf = pool.get();
                    assert!(buf.is_empty());
                    buf.write_u64(id);
                    buf.write_u64(round);
                    assert_eq!(buf.read_u64(), id);
                    assert_eq!(buf.read_u64(), round);
                    pool.put(buf);
                }
            });
        }
    });

    // At most one live buffer per thread at a time
    assert!(pool.cap() <= 8);
    assert_eq!(pool.len(), pool.cap());
}
