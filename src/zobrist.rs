//! Implements `ZobristArrays`.

use lazy_static::lazy_static;


/// A tiny deterministic pseudo-random generator used to produce the
/// Zobrist keys.
///
/// The generator is fixed so that every build of the engine produces
/// exactly the same tables, which keeps hash keys (and therefore
/// transposition-table contents and repetition detection) stable
/// across versions.
pub struct Prng {
    a: u64,
    b: u64,
    c: u64,
    d: u64,
}

impl Prng {
    pub const fn new(a: u64, b: u64, c: u64, d: u64) -> Prng {
        Prng { a, b, c, d }
    }

    pub fn next_key(&mut self) -> u64 {
        self.a = self.a.wrapping_mul(2688792669).wrapping_add(180014855);
        self.b ^= self.b << 5;
        self.b ^= self.b >> 7;
        self.b ^= self.b << 29;

        let e = 1823811948u64.wrapping_mul(self.c).wrapping_add(self.d);
        self.d = e >> 32;
        self.c = e;

        self.a.wrapping_add(self.b).wrapping_add(self.c)
    }
}


/// Tables for calculating Zobrist hashes.
///
/// Zobrist hashing is a technique to transform a board position into
/// a number of a fixed length, with an equal distribution over all
/// possible numbers, invented by Albert Zobrist. The key property of
/// this method is that two similar positions generate entirely
/// different hash numbers.
pub struct ZobristArrays {
    /// The constant with which the hash value should be XOR-ed when
    /// the side to move is black.
    pub side: u64,

    /// Constants with which the hash value should be XOR-ed for the
    /// old and the new castling rights on each move. Index 0 (no
    /// rights) is zero.
    pub castling: [u64; 16],

    /// Constants with which the hash value should be XOR-ed for the
    /// file of the en-passant square, when one exists.
    pub en_passant: [u64; 8],

    /// Constants with which the hash value should be XOR-ed when a
    /// piece appears or disappears on a square. Indexed by `Piece`.
    pub piece_square: [[u64; 64]; 12],

    /// Constants with which the hash value should be XOR-ed to
    /// reflect the number of pieces of each kind held in hand.
    /// Count 0 maps to zero.
    #[cfg(feature = "crazyhouse")]
    pub hand: [[u64; 17]; 12],
}

impl ZobristArrays {
    /// Creates and initializes a new instance.
    fn new() -> ZobristArrays {
        let mut prng = Prng::new(736209358, 11200023, 904492875, 3429570234895);

        let side = prng.next_key();

        let mut castling = [0; 16];
        for key in castling.iter_mut() {
            *key = prng.next_key();
        }
        castling[0] = 0;

        let mut en_passant = [0; 8];
        for key in en_passant.iter_mut() {
            *key = prng.next_key();
        }

        let mut piece_square = [[0; 64]; 12];
        for square_keys in piece_square.iter_mut() {
            for key in square_keys.iter_mut() {
                *key = prng.next_key();
            }
        }

        #[cfg(feature = "crazyhouse")]
        let hand = {
            let mut hand = [[0; 17]; 12];
            for count_keys in hand.iter_mut() {
                for key in count_keys.iter_mut() {
                    *key = prng.next_key();
                }
                count_keys[0] = 0;
            }
            hand
        };

        ZobristArrays {
            side,
            castling,
            en_passant,
            piece_square,
            #[cfg(feature = "crazyhouse")]
            hand,
        }
    }

    /// Returns a reference to an initialized `ZobristArrays` object.
    ///
    /// The object is created only during the first call. All next
    /// calls will return a reference to the same object.
    #[inline]
    pub fn get() -> &'static ZobristArrays {
        lazy_static! {
            static ref ARRAYS: ZobristArrays = ZobristArrays::new();
        }
        &ARRAYS
    }
}
