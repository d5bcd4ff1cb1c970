mod nb {
    use super::super::{Error, Instance, Serial};
    use embedded_hal_nb::serial::ErrorKind;
    use embedded_hal_nb::{serial, serial::ErrorType};

    impl embedded_hal_nb::serial::Error for Error {
        fn kind(&self) -> ErrorKind {
            match self {
                Error::BadFileDescriptor => ErrorKind::Other,
            }
        }
    }

    impl<USART: Instance> ErrorType for Serial<USART> {
        type Error = Error;
    }

    impl<USART: Instance> serial::Write<u8> for Serial<USART> {
        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            self.write_u8(word)
        }

        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Serial::flush(self)
        }
    }

    impl<USART: Instance> serial::Read<u8> for Serial<USART> {
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            Serial::read(self)
        }
    }
}

mod io {
    use super::super::{Error, Instance, Serial};

    impl embedded_io::Error for Error {
        fn kind(&self) -> embedded_io::ErrorKind {
            match self {
                Error::BadFileDescriptor => embedded_io::ErrorKind::InvalidInput,
            }
        }
    }

    impl<USART: Instance> embedded_io::ErrorType for Serial<USART> {
        type Error = Error;
    }

    impl<USART: Instance> embedded_io::Write for Serial<USART> {
        fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error> {
            self.bwrite_all(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            ::nb::block!(Serial::flush(self))
        }
    }

    impl<USART: Instance> embedded_io::Read for Serial<USART> {
        /// Blocks for the first byte, then returns whatever else already arrived
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let Some((first, rest)) = buf.split_first_mut() else {
                return Ok(0);
            };
            *first = self.bread_byte();
            let mut n = 1;
            for slot in rest {
                match Serial::read(self) {
                    Ok(byte) => {
                        *slot = byte;
                        n += 1;
                    }
                    Err(_) => break,
                }
            }
            Ok(n)
        }
    }
}
